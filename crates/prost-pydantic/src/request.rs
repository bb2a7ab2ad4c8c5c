//! The plugin boundary: `CodeGeneratorRequest` bytes in, a
//! `CodeGeneratorResponse` out.
//!
//! The request is walked field by field instead of being decoded as a whole,
//! so each `proto_file` entry stays available as raw bytes. Those bytes feed
//! a [`DescriptorPool`], which keeps the `buf.validate` extension options
//! that `prost_types` would drop as unknown fields.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use prost::Message;
use prost::encoding::{WireType, decode_key, decode_varint, encode_key, encode_varint};
use prost_reflect::DescriptorPool;
use prost_types::FileDescriptorProto;
use prost_types::compiler::CodeGeneratorResponse;
use prost_types::compiler::code_generator_response::{Feature, File};

use crate::error::{DecodeError, Diagnostic, Error};

/// A decoded `CodeGeneratorRequest`.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Paths of the files to generate, in request order.
    pub files_to_generate: Vec<String>,
    /// The raw plugin parameter string.
    pub parameter: String,
    /// Every file in the request, dependencies before dependents.
    pub proto_files: Vec<FileDescriptorProto>,
    /// The encoded form of each entry of `proto_files`.
    raw_files: Vec<Vec<u8>>,
}

impl GenerationRequest {
    /// Build a request from already-decoded descriptors.
    #[must_use]
    pub fn new(
        files_to_generate: Vec<String>,
        parameter: impl Into<String>,
        proto_files: Vec<FileDescriptorProto>,
    ) -> Self {
        let raw_files = proto_files.iter().map(Message::encode_to_vec).collect();
        Self {
            files_to_generate,
            parameter: parameter.into(),
            proto_files,
            raw_files,
        }
    }

    /// Decode an encoded `CodeGeneratorRequest`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for truncated or malformed input.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut request = Self::default();
        let mut cursor = bytes;
        while !cursor.is_empty() {
            let (tag, wire_type) = decode_key(&mut cursor).map_err(decode_error)?;
            match (tag, wire_type) {
                (1, WireType::LengthDelimited) => {
                    let value = take_len(&mut cursor, "file_to_generate")?;
                    request.files_to_generate.push(utf8(value, "file_to_generate")?);
                }
                (2, WireType::LengthDelimited) => {
                    let value = take_len(&mut cursor, "parameter")?;
                    request.parameter = utf8(value, "parameter")?;
                }
                (15, WireType::LengthDelimited) => {
                    let value = take_len(&mut cursor, "proto_file")?;
                    let file = FileDescriptorProto::decode(value).map_err(decode_error)?;
                    request.proto_files.push(file);
                    request.raw_files.push(value.to_vec());
                }
                _ => skip_wire_value(&mut cursor, wire_type)?,
            }
        }
        tracing::debug!(
            files = request.proto_files.len(),
            targets = request.files_to_generate.len(),
            parameter = %request.parameter,
            "decoded request"
        );
        Ok(request)
    }

    /// A reflection pool over every file of the request, extension options
    /// included.
    ///
    /// # Errors
    ///
    /// Returns a description of why the pool could not be built.
    pub fn descriptor_pool(&self) -> Result<DescriptorPool, String> {
        let bytes = encode_file_descriptor_set(&self.raw_files);
        let mut pool = DescriptorPool::new();
        match catch_unwind(AssertUnwindSafe(|| pool.decode_file_descriptor_set(bytes.as_slice()))) {
            Ok(Ok(())) => Ok(pool),
            Ok(Err(err)) => Err(err.to_string()),
            Err(panic) => Err(format!(
                "panic during descriptor pool decode: {}",
                panic_message(&panic)
            )),
        }
    }
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Output path, relative to the plugin output directory.
    pub name: String,
    /// Complete file content.
    pub content: String,
}

/// Everything a successful run produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutput {
    /// Generated files, requested modules first, then scaffolding.
    pub files: Vec<GeneratedFile>,
    /// Non-fatal findings.
    pub diagnostics: Vec<Diagnostic>,
}

impl GenerationOutput {
    /// The response to hand back to `protoc`.
    #[must_use]
    pub fn into_response(self) -> CodeGeneratorResponse {
        CodeGeneratorResponse {
            supported_features: Some(supported_features()),
            file: self
                .files
                .into_iter()
                .map(|file| File {
                    name: Some(file.name),
                    content: Some(file.content),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}

/// A response reporting `err` and nothing else.
#[must_use]
pub fn error_response(err: &Error) -> CodeGeneratorResponse {
    CodeGeneratorResponse {
        error: Some(err.to_string()),
        ..Default::default()
    }
}

#[allow(clippy::cast_sign_loss)]
fn supported_features() -> u64 {
    Feature::Proto3Optional as i32 as u64
}

fn decode_error(err: impl ToString) -> DecodeError {
    DecodeError {
        cause: err.to_string(),
    }
}

fn utf8(bytes: &[u8], field: &str) -> Result<String, DecodeError> {
    std::str::from_utf8(bytes)
        .map(ToString::to_string)
        .map_err(|err| decode_error(format!("invalid UTF-8 in {field}: {err}")))
}

fn take_len<'b>(cursor: &mut &'b [u8], field: &str) -> Result<&'b [u8], DecodeError> {
    let len = decode_len(cursor)?;
    if cursor.len() < len {
        return Err(decode_error(format!("truncated {field}")));
    }
    let (value, rest) = cursor.split_at(len);
    *cursor = rest;
    Ok(value)
}

fn encode_file_descriptor_set(files: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for file in files {
        encode_key(1, WireType::LengthDelimited, &mut out);
        encode_varint(file.len() as u64, &mut out);
        out.extend_from_slice(file);
    }
    out
}

fn decode_len(cursor: &mut &[u8]) -> Result<usize, DecodeError> {
    let len = decode_varint(cursor).map_err(decode_error)?;
    usize::try_from(len).map_err(|_| decode_error("length does not fit in usize"))
}

fn skip_wire_value(cursor: &mut &[u8], wire_type: WireType) -> Result<(), DecodeError> {
    let width = match wire_type {
        WireType::Varint => {
            decode_varint(cursor).map_err(decode_error)?;
            return Ok(());
        }
        WireType::LengthDelimited => decode_len(cursor)?,
        WireType::ThirtyTwoBit => 4,
        WireType::SixtyFourBit => 8,
        WireType::StartGroup | WireType::EndGroup => {
            return Err(decode_error("group wire types are not supported"));
        }
    };
    if cursor.len() < width {
        return Err(decode_error("truncated field"));
    }
    *cursor = &cursor[width..];
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Generate [Pydantic v2](https://docs.pydantic.dev) models from Protocol
//! Buffer descriptors, carrying
//! [`buf.validate`](https://github.com/bufbuild/protovalidate) rules over as
//! field constraints and validators.
//!
//! This crate is the core of the `protoc-gen-pydantic` plugin. It takes a
//! decoded `CodeGeneratorRequest` and returns the generated Python files, and
//! never touches stdin, stdout or the filesystem itself.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use prost_pydantic::{GenerationRequest, error_response, generate};
//! # fn example(bytes: &[u8]) -> Result<(), prost_pydantic::Error> {
//! let request = GenerationRequest::decode(bytes)?;
//! let response = match generate(&request) {
//!     Ok(output) => output.into_response(),
//!     Err(err) => error_response(&err),
//! };
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! # Pipeline
//!
//! | Stage | Type |
//! |-------|------|
//! | Rule extraction | [`annotations::extract`] |
//! | Resolved descriptor graph | [`schema::SchemaIndex`] |
//! | Python identifiers | [`names::NameResolver`] |
//! | Field types and defaults | [`types::TypeMapper`] |
//! | Rules to Pydantic arguments | [`constraints::ConstraintTranslator`] |
//! | Class definitions | [`emit::Emitter`] |
//! | Modules, imports, scaffolding | [`plan::Planner`] |
//!
//! # Error types
//!
//! Every fatal condition is a variant of [`Error`]. Findings that do not stop
//! generation come back as [`Diagnostic`]s in [`GenerationOutput`].

#![warn(missing_docs)]

pub mod annotations;
mod config;
pub mod constraints;
pub mod emit;
mod error;
mod generator;
pub mod names;
pub mod plan;
pub mod python;
mod request;
pub mod schema;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::{BaseModel, EnumAliasPolicy, GeneratorConfig, GeneratorOption};
pub use error::{
    ConfigurationError, ConstraintConflictError, DecodeError, Diagnostic, DuplicateNameError,
    Error, Location, NameCollisionError, Severity, SourceSpan, UnresolvedReferenceError,
    UnsupportedTypeError,
};
pub use generator::generate;
pub use request::{GeneratedFile, GenerationOutput, GenerationRequest, error_response};

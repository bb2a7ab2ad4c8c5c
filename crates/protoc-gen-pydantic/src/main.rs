//! `protoc` plugin: reads a `CodeGeneratorRequest` on stdin and writes a
//! `CodeGeneratorResponse` with Pydantic v2 modules on stdout.
//!
//! Logs go to stderr. Set `PROTOC_GEN_PYDANTIC_LOG` (an `EnvFilter`
//! directive such as `debug`) for more than warnings.

use std::io::{self, Read, Write};

use anyhow::Context;
use prost::Message;
use prost_pydantic::{GenerationRequest, Severity, error_response, generate};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PROTOC_GEN_PYDANTIC_LOG";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let mut input = Vec::new();
    io::stdin()
        .read_to_end(&mut input)
        .context("failed to read request from stdin")?;

    let request = GenerationRequest::decode(&input).context("failed to decode request")?;
    let response = match generate(&request) {
        Ok(output) => {
            for diagnostic in &output.diagnostics {
                match diagnostic.severity {
                    Severity::Warning => tracing::warn!("{diagnostic}"),
                    Severity::Note => tracing::info!("{diagnostic}"),
                }
            }
            tracing::info!(files = output.files.len(), "generated");
            output.into_response()
        }
        Err(err) => {
            tracing::error!("{err}");
            error_response(&err)
        }
    };

    io::stdout()
        .write_all(&response.encode_to_vec())
        .context("failed to write response to stdout")?;
    Ok(())
}

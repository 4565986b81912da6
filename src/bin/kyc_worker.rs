//! One-shot verification worker.
//!
//! Reads a `VerificationRequest` JSON document from the file path given as
//! the first argument (or from stdin when no argument is given), runs the
//! pipeline against the configured OCR sidecar and LLM backend, and prints
//! the `VerificationResponse` JSON to stdout.

use std::io::Read;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use kyc_verify::{VerificationRequest, VerificationService, VerifyConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read request file {path}"))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read request from stdin")?;
            buffer
        }
    };
    let request: VerificationRequest =
        serde_json::from_str(&raw).context("request is not valid JSON")?;

    let config = VerifyConfig::from_env();
    let service = VerificationService::from_config(&config)?;
    let response = service.verify(request).await;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

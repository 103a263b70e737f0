//! tiny-spark: command-line client for a Breez Spark wallet

mod cli;
mod commands;
mod output;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tiny_spark::SparkError;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = dotenvy::dotenv() {
        tracing::debug!(error = %err, "No .env file loaded");
    }

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", format_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start Tokio runtime")?;
    runtime.block_on(commands::run(cli))
}

/// Error message plus, for wallet errors, a recovery hint.
fn format_error(err: &anyhow::Error) -> String {
    let mut message = format!("Error: {err:#}");

    let Some(spark) = err.chain().find_map(|e| e.downcast_ref::<SparkError>()) else {
        return message;
    };

    if let Some(hint) = spark.recovery_hint() {
        message.push_str(&format!("\n\nHint: {hint}"));
    }
    let moves_funds = spark.send_stage().is_some()
        || matches!(spark, SparkError::Receive { .. } | SparkError::Resolve { .. });
    if moves_funds {
        if spark.balance_unaffected() {
            message.push_str("\nYour balance was not affected.");
        } else {
            message.push_str(
                "\nThe payment may still complete; \
                 check 'tiny-spark transactions' before retrying.",
            );
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_spark::{PaymentMethod, SendStage};

    fn send_error(stage: SendStage) -> anyhow::Error {
        anyhow::Error::new(SparkError::Send {
            method: PaymentMethod::LightningInvoice,
            stage,
            reason: "no route".to_string(),
        })
    }

    #[test]
    fn test_prepare_failure_reports_balance_unaffected() {
        let message = format_error(&send_error(SendStage::Prepare));
        assert!(message.starts_with("Error: "));
        assert!(message.contains("no route"));
        assert!(message.contains("Your balance was not affected."));
    }

    #[test]
    fn test_execute_failure_is_not_reported_safe() {
        let message = format_error(&send_error(SendStage::Execute));
        assert!(!message.contains("Your balance was not affected."));
        assert!(message.contains("may still complete"));
    }

    #[test]
    fn test_plain_errors_have_no_hint() {
        let message = format_error(&anyhow::anyhow!("BREEZ_API_KEY is required"));
        assert_eq!(message, "Error: BREEZ_API_KEY is required");
    }
}

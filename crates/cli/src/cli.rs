use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tiny_spark::PaymentMethod;

/// Comment attached to LNURL payments when none is given.
pub const DEFAULT_LNURL_COMMENT: &str = "Payment via LNURL";

const EXAMPLES: &str = "Examples:
  tiny-spark balance
  tiny-spark receive lightning 5000 'Coffee payment'
  tiny-spark send lightning lnbc1... 5000
  tiny-spark transactions 20";

#[derive(Parser)]
#[command(
    name = "tiny-spark",
    version,
    about = "Breez Tiny Spark: a small Lightning, Bitcoin and Spark wallet client",
    after_help = EXAMPLES
)]
pub struct Cli {
    #[command(flatten)]
    pub wallet: WalletOptions,
    #[command(flatten)]
    pub output: OutputArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show wallet balance
    #[command(visible_alias = "bal")]
    Balance,
    /// Show transaction history
    #[command(visible_alias = "tx")]
    Transactions {
        /// Number of transactions to show
        #[arg(default_value_t = 10)]
        limit: u32,
    },
    /// Create a payment request
    Receive {
        #[arg(value_enum)]
        kind: ReceiveKind,
        /// Amount in sats (ignored for bitcoin and spark addresses)
        amount: u64,
        /// Optional description
        description: Vec<String>,
    },
    /// Send a payment
    Send {
        #[arg(value_enum)]
        kind: SendKind,
        /// Invoice, address or Lightning address
        destination: String,
        /// Amount in sats (optional for invoices that carry an amount)
        amount: Option<u64>,
        /// Comment sent with LNURL payments
        #[arg(long)]
        comment: Option<String>,
    },
    /// Show payment details
    Payment {
        /// Payment id, as listed by `transactions`
        id: String,
    },
    /// Show token balances
    Tokens,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveKind {
    /// Create Lightning invoice
    #[value(alias = "ln")]
    Lightning,
    /// Create Bitcoin address
    #[value(alias = "btc")]
    Bitcoin,
    /// Create Spark address
    Spark,
}

impl From<ReceiveKind> for PaymentMethod {
    fn from(kind: ReceiveKind) -> Self {
        match kind {
            ReceiveKind::Lightning => PaymentMethod::LightningInvoice,
            ReceiveKind::Bitcoin => PaymentMethod::OnchainAddress,
            ReceiveKind::Spark => PaymentMethod::LedgerAddress,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    /// Pay Lightning invoice
    #[value(alias = "ln")]
    Lightning,
    /// Send to Bitcoin address
    #[value(alias = "btc")]
    Bitcoin,
    /// Send to Spark address
    Spark,
    /// Pay Lightning address or LNURL
    Lnurl,
}

impl SendKind {
    /// Facade method for direct sends; `None` for LNURL.
    pub fn payment_method(self) -> Option<PaymentMethod> {
        match self {
            SendKind::Lightning => Some(PaymentMethod::LightningInvoice),
            SendKind::Bitcoin => Some(PaymentMethod::OnchainAddress),
            SendKind::Spark => Some(PaymentMethod::LedgerAddress),
            SendKind::Lnurl => None,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct WalletOptions {
    /// Breez API key
    #[arg(long, env = "BREEZ_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,
    /// BIP39 recovery phrase
    #[arg(long, env = "BREEZ_MNEMONIC", hide_env_values = true, global = true)]
    pub mnemonic: Option<String>,
    /// Network: mainnet, testnet, signet or regtest (unknown names use regtest)
    #[arg(long, env = "BREEZ_NETWORK", global = true)]
    pub network: Option<String>,
    /// Wallet storage directory
    #[arg(long, env = "BREEZ_WORKING_DIR", global = true)]
    pub working_dir: Option<PathBuf>,
    /// Older name for the storage directory
    #[arg(long, env = "BREEZ_DATA_DIR", hide = true, global = true)]
    pub data_dir: Option<PathBuf>,
    /// Seconds to wait for the initial sync
    #[arg(long, env = "TINY_SPARK_SYNC_TIMEOUT_SECS", global = true)]
    pub sync_timeout_secs: Option<u64>,
    /// Seconds before a single wallet call is abandoned
    #[arg(long, env = "TINY_SPARK_REQUEST_TIMEOUT_SECS", global = true)]
    pub request_timeout_secs: Option<u64>,
    /// Use an in-memory demo wallet instead of Breez
    #[arg(long, env = "TINY_SPARK_MOCK", global = true)]
    pub mock: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["tiny-spark", "--api-key", "k", "--mnemonic", "m"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("valid arguments")
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verb_aliases() {
        assert_eq!(parse(&["bal"]).command, Command::Balance);
        assert_eq!(
            parse(&["tx"]).command,
            Command::Transactions { limit: 10 }
        );
        assert_eq!(
            parse(&["transactions", "25"]).command,
            Command::Transactions { limit: 25 }
        );
    }

    #[test]
    fn test_receive_joins_description() {
        let cli = parse(&["receive", "ln", "5000", "Coffee", "payment"]);
        assert_eq!(
            cli.command,
            Command::Receive {
                kind: ReceiveKind::Lightning,
                amount: 5000,
                description: vec!["Coffee".to_string(), "payment".to_string()],
            }
        );
    }

    #[test]
    fn test_send_kinds() {
        let cli = parse(&["send", "btc", "bc1qxyz", "1000"]);
        assert_eq!(
            cli.command,
            Command::Send {
                kind: SendKind::Bitcoin,
                destination: "bc1qxyz".to_string(),
                amount: Some(1000),
                comment: None,
            }
        );

        let cli = parse(&["send", "lightning", "lnbc1invoice"]);
        assert!(matches!(cli.command, Command::Send { amount: None, .. }));

        let cli = parse(&["--json", "send", "lnurl", "alice@example.com", "21", "--comment", "hi"]);
        assert!(cli.output.json);
        assert_eq!(SendKind::Lnurl.payment_method(), None);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = Cli::try_parse_from(["tiny-spark", "receive", "lnurl", "10"]);
        assert!(result.is_err());
    }
}

use anyhow::{Result, bail};
use chrono::Utc;
use tiny_spark::mock::{self, Backend};
use tiny_spark::runtime::{
    PaymentKind, RuntimePayment, RuntimePaymentStatus, SettlementRail, TokenHolding,
};
use tiny_spark::{Connector, SparkWallet};

use crate::cli::{Cli, Command, DEFAULT_LNURL_COMMENT};
use crate::output::{self, print_output};
use crate::settings;

/// Lightning address the demo wallet can pay.
pub const DEMO_LIGHTNING_ADDRESS: &str = "demo@tiny-spark.dev";

pub async fn run(cli: Cli) -> Result<()> {
    let connector = connector(cli.wallet.mock)?;
    run_with(cli, connector.as_ref()).await
}

/// Connect through `connector`, run the command, then disconnect.
///
/// Disconnect runs whether or not the command succeeded.
pub async fn run_with(cli: Cli, connector: &dyn Connector) -> Result<()> {
    let config = settings::wallet_config(&cli.wallet)?;

    tracing::debug!(network = %config.network, "Connecting wallet");
    let mut wallet = SparkWallet::connect(config, connector).await?;

    let result = execute(&wallet, cli.command, cli.output.json).await;

    if let Err(err) = wallet.disconnect().await {
        tracing::warn!(error = %err, "Failed to disconnect wallet");
    }
    result
}

fn connector(use_mock: bool) -> Result<Box<dyn Connector>> {
    if use_mock {
        return Ok(Box::new(demo_backend()));
    }

    #[cfg(feature = "breez")]
    {
        Ok(Box::new(tiny_spark::breez::BreezConnector))
    }

    #[cfg(not(feature = "breez"))]
    {
        bail!("built without Breez support; rebuild with --features breez or pass --mock")
    }
}

async fn execute(wallet: &SparkWallet, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Balance => {
            let balance = wallet.get_balance().await?;
            print_output(&balance, json, || output::balance(&balance))
        }
        Command::Transactions { limit } => {
            let mut payments = wallet.list_payments(limit).await?;
            payments.truncate(limit as usize);
            print_output(&payments, json, || output::transactions(&payments, limit))
        }
        Command::Receive {
            kind,
            amount,
            description,
        } => {
            let method = kind.into();
            let request = wallet
                .create_receive_request(method, amount, &description.join(" "))
                .await?;
            print_output(&request, json, || {
                output::receive_request(&request, method.as_str())
            })
        }
        Command::Send {
            kind,
            destination,
            amount,
            comment,
        } => {
            let result = match kind.payment_method() {
                Some(method) => wallet.send_payment(method, &destination, amount).await?,
                None => {
                    let Some(amount) = amount else {
                        bail!("An amount is required when paying a Lightning address or LNURL");
                    };
                    let comment = comment.as_deref().unwrap_or(DEFAULT_LNURL_COMMENT);
                    wallet.pay_address_alias(&destination, amount, comment).await?
                }
            };
            print_output(&result, json, || output::send_result(&result))
        }
        Command::Payment { id } => {
            let payment = wallet.get_payment(&id).await?;
            print_output(&payment, json, || output::payment(&payment))
        }
        Command::Tokens => {
            let mut tokens = wallet.get_token_balances().await?;
            output::sort_tokens(&mut tokens);
            print_output(&tokens, json, || output::tokens(&tokens))
        }
    }
}

/// In-memory wallet with some history, for trying the CLI without credentials.
fn demo_backend() -> Backend {
    let backend = Backend::with_balance(250_000);
    let now = Utc::now().timestamp().max(0) as u64;

    let history = [
        (
            "demo-receive-1",
            PaymentKind::Receive,
            150_000,
            0,
            SettlementRail::Lightning,
            "Initial funding",
            7_200,
        ),
        (
            "demo-send-1",
            PaymentKind::Send,
            12_500,
            3,
            SettlementRail::Lightning,
            "Coffee beans",
            3_600,
        ),
        (
            "demo-receive-2",
            PaymentKind::Receive,
            112_503,
            0,
            SettlementRail::Spark,
            "Refund",
            600,
        ),
    ];
    for (id, kind, amount_sats, fee_sats, rail, description, age_secs) in history {
        backend.push_payment(RuntimePayment {
            id: id.to_string(),
            kind: Some(kind),
            amount_sats,
            fee_sats,
            status: RuntimePaymentStatus::Completed,
            timestamp: now.saturating_sub(age_secs),
            rail,
            description: Some(description.to_string()),
            preimage: None,
        });
    }

    backend.add_token(TokenHolding {
        token_id: "btkn1demo".to_string(),
        balance: 12_345_000,
        name: "Demo Dollar".to_string(),
        ticker: "DUSD".to_string(),
        decimals: 6,
    });
    backend.add_alias(
        DEMO_LIGHTNING_ADDRESS,
        mock::lightning_address(DEMO_LIGHTNING_ADDRESS, 1, 1_000_000),
    );
    backend
}

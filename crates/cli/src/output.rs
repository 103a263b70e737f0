//! Human-readable and JSON rendering
//!
//! Renderers return strings so they can be tested; callers print them.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tiny_spark::{BalanceSnapshot, PaymentRecord, ReceiveRequest, SendResult, TokenBalance};

const DESCRIPTION_WIDTH: usize = 20;

pub fn print_output<T: Serialize>(
    value: &T,
    json: bool,
    human: impl FnOnce() -> String,
) -> Result<()> {
    if json {
        let output = serde_json::to_string_pretty(value)?;
        println!("{output}");
    } else {
        print!("{}", human());
    }
    Ok(())
}

/// Signed amount with an explicit `+` for positive values.
pub fn format_amount(sats: i64) -> String {
    if sats > 0 {
        format!("+{sats}")
    } else {
        sats.to_string()
    }
}

/// Shorten `text` to `max` characters, ending in `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut shortened: String = text.chars().take(max - 3).collect();
    shortened.push_str("...");
    shortened
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_time(time: &DateTime<Utc>, with_seconds: bool) -> String {
    if with_seconds {
        time.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        time.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[derive(Tabled)]
struct PaymentRow {
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "TYPE")]
    direction: &'static str,
    #[tabled(rename = "AMOUNT")]
    amount: String,
    #[tabled(rename = "FEE")]
    fee: u64,
    #[tabled(rename = "STATUS")]
    status: &'static str,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

#[derive(Tabled)]
struct TokenRow {
    #[tabled(rename = "TOKEN ID")]
    token_id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TICKER")]
    ticker: String,
    #[tabled(rename = "BALANCE")]
    balance: String,
}

fn render_table<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::psql());
    format!("{table}\n")
}

pub fn balance(balance: &BalanceSnapshot) -> String {
    format!(
        "Wallet Balance:\n\
         ----------------\n\
         Spendable:      {} sats\n\
         Max Payable:    {} sats\n\
         Max Receivable: {} sats\n",
        balance.spendable_sats, balance.max_payable_sats, balance.max_receivable_sats
    )
}

pub fn transactions(records: &[PaymentRecord], limit: u32) -> String {
    let mut out = format!("Last {limit} Transactions:\n{}\n", "-".repeat(20));
    if records.is_empty() {
        out.push_str("No transactions found\n");
        return out;
    }

    let rows: Vec<PaymentRow> = records
        .iter()
        .map(|record| PaymentRow {
            time: format_time(&record.timestamp, false),
            direction: record.direction.label(),
            amount: format_amount(record.amount_sats),
            fee: record.fee_sats,
            status: record.status.label(),
            description: match truncate(&record.description, DESCRIPTION_WIDTH) {
                d if d.is_empty() => "-".to_string(),
                d => d,
            },
        })
        .collect();

    out.push_str(&render_table(rows));
    out
}

pub fn payment(record: &PaymentRecord) -> String {
    format!(
        "Payment Details:\n\
         ID:          {}\n\
         Type:        {}\n\
         Method:      {}\n\
         Amount:      {} sats\n\
         Fee:         {} sats\n\
         Status:      {}\n\
         Description: {}\n\
         Time:        {}\n",
        record.id,
        record.direction.label(),
        record.method,
        format_amount(record.amount_sats),
        record.fee_sats,
        record.status.label(),
        record.description,
        format_time(&record.timestamp, true),
    )
}

pub fn receive_request(request: &ReceiveRequest, method: &str) -> String {
    format!(
        "Payment Request Created:\n\
         Type:        {}\n\
         Amount:      {} sats\n\
         Fee:         {} sats\n\
         Description: {}\n\
         Expires:     {}\n\
         \n\
         Payment Request:\n\
         {}\n",
        title_case(method),
        request.requested_amount_sats,
        request.fee_sats,
        request.description,
        format_time(&request.expires_at, true),
        request.payment_request,
    )
}

pub fn send_result(result: &SendResult) -> String {
    let payment = &result.payment;
    let mut out = format!(
        "Payment Sent:\n\
         Payment ID:   {}\n\
         Amount:       {} sats\n\
         Fee:          {} sats\n\
         Status:       {}\n\
         Completed:    {}\n",
        payment.id,
        format_amount(payment.amount_sats),
        payment.fee_sats,
        payment.status.label(),
        format_time(&payment.timestamp, true),
    );
    if let Some(preimage) = &result.preimage {
        out.push_str(&format!("Preimage:     {preimage}\n"));
    }
    out
}

/// Tokens sorted by ticker, then id.
pub fn sort_tokens(tokens: &mut [TokenBalance]) {
    tokens.sort_by(|a, b| a.ticker.cmp(&b.ticker).then_with(|| a.token_id.cmp(&b.token_id)));
}

pub fn tokens(tokens: &[TokenBalance]) -> String {
    let mut out = String::from("Token Balances:\n---------------\n");
    if tokens.is_empty() {
        out.push_str("No tokens found\n");
        return out;
    }

    let rows: Vec<TokenRow> = tokens
        .iter()
        .map(|token| TokenRow {
            token_id: token.token_id.clone(),
            name: token.name.clone(),
            ticker: token.ticker.clone(),
            balance: if token.decimals == 0 {
                token.balance.to_string()
            } else {
                format!("{} ({})", token.display_balance(), token.balance)
            },
        })
        .collect();

    out.push_str(&render_table(rows));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tiny_spark::{Direction, PaymentStatus};

    fn record(amount_sats: i64, description: &str) -> PaymentRecord {
        PaymentRecord {
            id: "pay-1".to_string(),
            direction: if amount_sats > 0 {
                Direction::Incoming
            } else {
                Direction::Outgoing
            },
            amount_sats,
            fee_sats: 3,
            status: PaymentStatus::Completed,
            description: description.to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            method: "lightning".to_string(),
        }
    }

    fn token(id: &str, ticker: &str, balance: u128, decimals: u32) -> TokenBalance {
        TokenBalance {
            token_id: id.to_string(),
            balance,
            name: format!("{ticker} Token"),
            ticker: ticker.to_string(),
            decimals,
        }
    }

    #[test]
    fn test_format_amount_signs() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(1500), "+1500");
        assert_eq!(format_amount(-42), "-42");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("exactly twenty chars", 20), "exactly twenty chars");
        assert_eq!(truncate("this description is too long", 20), "this description ...");
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("žluťoučký kůň úpěl ódy", 10), "žluťouč...");
    }

    #[test]
    fn test_transactions_table() {
        let rendered = transactions(&[record(1500, "Coffee"), record(-200, "")], 10);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Last 10 Transactions:");

        let header: Vec<&str> = lines[2].split('|').map(str::trim).collect();
        assert_eq!(header, vec!["TIME", "TYPE", "AMOUNT", "FEE", "STATUS", "DESCRIPTION"]);
        assert!(lines[3].trim().starts_with('-'));

        let first: Vec<&str> = lines[4].split('|').map(str::trim).collect();
        assert_eq!(first, vec!["2023-11-14 22:13", "receive", "+1500", "3", "Complete", "Coffee"]);
        let second: Vec<&str> = lines[5].split('|').map(str::trim).collect();
        assert_eq!(second, vec!["2023-11-14 22:13", "send", "-200", "3", "Complete", "-"]);
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_token_table_columns() {
        let rendered = tokens(&[token("btkn-a", "USDB", 7, 0)]);
        let lines: Vec<&str> = rendered.lines().collect();
        let header: Vec<&str> = lines[2].split('|').map(str::trim).collect();
        assert_eq!(header, vec!["TOKEN ID", "NAME", "TICKER", "BALANCE"]);
        let row: Vec<&str> = lines[4].split('|').map(str::trim).collect();
        assert_eq!(row, vec!["btkn-a", "USDB Token", "USDB", "7"]);
    }

    #[test]
    fn test_empty_lists() {
        assert!(transactions(&[], 5).ends_with("No transactions found\n"));
        assert!(tokens(&[]).ends_with("No tokens found\n"));
    }

    #[test]
    fn test_tokens_sorted_and_scaled() {
        let mut list = vec![
            token("btkn-z", "USDB", 2_500_000, 6),
            token("btkn-b", "ABC", 7, 0),
            token("btkn-a", "USDB", 1, 6),
        ];
        sort_tokens(&mut list);
        let ids: Vec<&str> = list.iter().map(|t| t.token_id.as_str()).collect();
        assert_eq!(ids, vec!["btkn-b", "btkn-a", "btkn-z"]);

        let rendered = tokens(&list);
        assert!(rendered.contains("2.5 (2500000)"));
        assert!(rendered.contains("0.000001 (1)"));
    }

    #[test]
    fn test_receive_block_title_cases_method() {
        let request = ReceiveRequest {
            payment_request: "lnbcrt1...".to_string(),
            requested_amount_sats: 5000,
            fee_sats: 0,
            description: "Coffee payment".to_string(),
            expires_at: DateTime::from_timestamp(1_700_086_400, 0).unwrap(),
        };
        let rendered = receive_request(&request, "lightning");
        assert!(rendered.starts_with("Payment Request Created:\nType:        Lightning\n"));
        assert!(rendered.ends_with("Payment Request:\nlnbcrt1...\n"));
    }
}

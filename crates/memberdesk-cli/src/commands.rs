//! Command line surface over the customer cache.
//!
//! Every subcommand is a direct call into `CustomerCache`; this module only
//! parses arguments and prints results.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use memberdesk_core::{ApiError, Attachment, Customer, CustomerCache, CustomerDraft, CustomerService, FeeStatusKind, FeeSummary};
use serde::Serialize;
use tracing::debug;

/// Maximum concurrent lookups for `show`.
/// Limits parallel requests to avoid overwhelming the server or hitting rate limits.
const MAX_CONCURRENT_REQUESTS: usize = 10;

/// Column widths for the list table
const NAME_WIDTH: usize = 28;
const EMAIL_WIDTH: usize = 30;

#[derive(Debug, Parser)]
#[command(name = "memberdesk", version, about = "Membership customer cache and fee status")]
pub struct Cli {
    /// Path to config.json (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a config file with the service location
    Init {
        #[arg(long)]
        url: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// List all customers with their fee status
    List {
        /// Most urgent fee status first
        #[arg(long)]
        by_status: bool,
    },
    /// Show one or more customers by id
    Show {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Count customers per fee status
    Summary,
    /// Create a customer from a JSON file
    Add {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Update a customer from a JSON file
    Edit {
        id: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete a customer
    Delete { id: String },
    /// Remove a customer's profile image
    RemoveImage { id: String },
}

#[derive(Debug, Serialize)]
struct CustomerRow<'a> {
    #[serde(flatten)]
    customer: &'a Customer,
    fee_status: memberdesk_core::FeeStatus,
}

pub async fn run<S: CustomerService>(
    command: Command,
    cache: &CustomerCache<S>,
    json: bool,
) -> Result<()> {
    let now = Utc::now();
    match command {
        Command::Init { .. } => anyhow::bail!("init is handled before connecting to the service"),
        Command::List { by_status } => {
            let mut customers = cache.load_all(false).await?;
            if by_status {
                sort_by_urgency(&mut customers, now);
            }
            print_customers(&customers, now, json)?;
            if !json {
                println!("\n{} customers, updated {}", customers.len(), cache.age_display());
            }
        }
        Command::Show { ids } => {
            let results: Vec<_> = stream::iter(ids.iter())
                .map(|id| async move { (id, cache.get_by_id(id.as_str()).await) })
                .buffered(MAX_CONCURRENT_REQUESTS)
                .collect()
                .await;

            let mut found = Vec::new();
            for (id, result) in results {
                match result {
                    Ok(customer) => found.push(customer),
                    Err(e) => eprintln!("{}", describe_lookup_failure(id, &e)),
                }
            }
            print_customers(&found, now, json)?;
        }
        Command::Summary => {
            let summary = cache
                .load_all(false)
                .await
                .map(|customers| FeeSummary::tally(&customers, now))?;
            print_summary(&summary, json)?;
        }
        Command::Add { file, image } => {
            let draft = read_draft(&file)?;
            let attachment = read_attachment(image.as_deref()).await?;
            let customer = cache.add(&draft, attachment.as_ref()).await?;
            print_customers(std::slice::from_ref(&customer), now, json)?;
        }
        Command::Edit { id, file, image } => {
            let draft = read_draft(&file)?;
            let attachment = read_attachment(image.as_deref()).await?;
            let customer = cache.edit(id.as_str(), &draft, attachment.as_ref()).await?;
            print_customers(std::slice::from_ref(&customer), now, json)?;
        }
        Command::Delete { id } => {
            cache.remove(id.as_str()).await?;
            println!("Deleted customer {}", id);
        }
        Command::RemoveImage { id } => {
            cache.remove_attachment(id.as_str()).await?;
            println!("Removed image for customer {}", id);
        }
    }
    Ok(())
}

fn read_draft(path: &Path) -> Result<CustomerDraft> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read customer file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse customer file: {}", path.display()))
}

async fn read_attachment(path: Option<&Path>) -> Result<Option<Attachment>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let attachment = Attachment::from_path(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    debug!(file = %attachment.file_name, bytes = attachment.len(), "Read attachment");
    Ok(Some(attachment))
}

fn sort_by_urgency(customers: &mut [Customer], now: DateTime<Utc>) {
    customers.sort_by(|a, b| {
        let sa = a.fee_status(now);
        let sb = b.fee_status(now);
        sb.kind
            .severity()
            .cmp(&sa.kind.severity())
            .then_with(|| sb.days.cmp(&sa.days))
            .then_with(|| a.display_name().to_lowercase().cmp(&b.display_name().to_lowercase()))
    });
}

fn print_customers(customers: &[Customer], now: DateTime<Utc>, json: bool) -> Result<()> {
    if json {
        let rows: Vec<CustomerRow<'_>> = customers
            .iter()
            .map(|customer| CustomerRow {
                customer,
                fee_status: customer.fee_status(now),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:>6}  {:<name$}  {:<email$}  {}",
        "ID",
        "NAME",
        "EMAIL",
        "FEE STATUS",
        name = NAME_WIDTH,
        email = EMAIL_WIDTH
    );
    for customer in customers {
        println!("{}", format_row(customer, now));
    }
    Ok(())
}

fn format_row(customer: &Customer, now: DateTime<Utc>) -> String {
    format!(
        "{:>6}  {:<name$}  {:<email$}  {}",
        customer.id,
        truncate(&customer.display_name(), NAME_WIDTH),
        truncate(customer.email.as_deref().unwrap_or("-"), EMAIL_WIDTH),
        customer.fee_status(now).label(),
        name = NAME_WIDTH,
        email = EMAIL_WIDTH
    )
}

fn print_summary(summary: &FeeSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    for kind in FeeStatusKind::ALL {
        println!("{:<10} {:>5}", kind.to_string(), summary.count(kind));
    }
    println!("{:<10} {:>5}", "Total", summary.total());
    println!("{:<10} {:>5}", "Attention", summary.needs_attention());
    Ok(())
}

fn describe_lookup_failure(id: &str, err: &ApiError) -> String {
    if err.is_not_found() {
        format!("{}: no such customer", id)
    } else {
        format!("{}: {}", id, err)
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::CommandFactory;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()
    }

    fn customer(id: i64, last: &str, next_due: Option<&str>) -> Customer {
        let mut c = Customer::new(id);
        c.first_name = Some("Pat".to_string());
        c.last_name = Some(last.to_string());
        c.next_due_date = next_due.map(String::from);
        c
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_show_multiple_ids() {
        let cli = Cli::try_parse_from(["memberdesk", "show", "1", "42"]).unwrap();
        match cli.command {
            Command::Show { ids } => assert_eq!(ids, vec!["1", "42"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_edit_with_image() {
        let cli = Cli::try_parse_from([
            "memberdesk", "--json", "edit", "7", "--file", "c.json", "--image", "p.png",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Edit { ref id, image: Some(_), .. } if id == "7"));
    }

    #[test]
    fn test_describe_lookup_failure() {
        let missing = ApiError::NotFound("{\"detail\":\"Not found.\"}".to_string());
        assert_eq!(describe_lookup_failure("42", &missing), "42: no such customer");

        let invalid = ApiError::InvalidId("abc".to_string());
        let message = describe_lookup_failure("abc", &invalid);
        assert!(message.starts_with("abc: "));
        assert_ne!(message, "abc: no such customer");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Hello World", 8), "Hello...");
        assert_eq!(truncate("Hi", 2), "Hi");
        assert_eq!(truncate("Zoë Zoë Zoë", 6), "Zoë...");
    }

    #[test]
    fn test_sort_by_urgency() {
        let mut customers = vec![
            customer(1, "Upcoming", Some("2024-08-01")),
            customer(2, "Late", Some("2024-06-01")),
            customer(3, "Soon", Some("2024-06-17")),
            customer(4, "Later", Some("2024-06-10")),
            customer(5, "Nobody", None),
        ];
        sort_by_urgency(&mut customers, now());
        let ids: Vec<i64> = customers.iter().map(|c| c.id.get()).collect();
        assert_eq!(ids, vec![2, 4, 3, 5, 1]);
    }

    #[test]
    fn test_format_row_includes_status_label() {
        let row = format_row(&customer(9, "Lovelace", Some("2024-06-18")), now());
        assert!(row.contains("Lovelace, Pat"));
        assert!(row.contains("Due in 3 days"));
        assert!(row.trim_start().starts_with('9'));
    }

    #[test]
    fn test_read_draft_from_file() {
        let path = std::env::temp_dir().join(format!("memberdesk-draft-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"firstName": "Ada", "monthlyFee": "25"}"#).unwrap();
        let draft = read_draft(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(draft.first_name.as_deref(), Some("Ada"));
        assert_eq!(draft.monthly_fee, Some(25.0));
    }

    #[tokio::test]
    async fn test_read_attachment_none() {
        assert!(read_attachment(None).await.unwrap().is_none());
    }
}

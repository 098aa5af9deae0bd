// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// Use library instead of local modules
use split_tracker::settings::{self, DEFAULT_DB_FILE, DEFAULT_SETTINGS_FILE, ENV_DB, ENV_SETTINGS};
use split_tracker::{
    format_money, format_timestamp, parse_amount, Ledger, Session, Settings, SqliteStore,
    TransactionKind, ValidationError, RECENT_LIMIT,
};

#[derive(Parser)]
#[command(
    name = "split-tracker",
    about = "Two-person shared expense ledger",
    version
)]
struct Cli {
    /// SQLite database holding the ledger document
    #[arg(long, global = true, env = ENV_DB, default_value = DEFAULT_DB_FILE)]
    db: PathBuf,

    /// JSON file with the two party names
    #[arg(long, global = true, env = ENV_SETTINGS, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show balances and the settlement suggestion
    Summary,
    /// List recent transactions, newest first
    List(ListArgs),
    /// Record a new transaction
    Add(AddArgs),
    /// Delete a transaction and reverse its effect
    Delete(DeleteArgs),
    /// List the transaction kinds
    Kinds,
    /// Interactive terminal UI (default)
    Ui(UiArgs),
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, default_value_t = RECENT_LIMIT)]
    limit: usize,
}

#[derive(Args)]
struct AddArgs {
    /// Who is recording the transaction
    #[arg(long = "as")]
    user: String,

    /// Kind tag (e.g. self_paid_split) or its full label
    #[arg(long, value_parser = parse_kind)]
    kind: TransactionKind,

    #[arg(long, value_parser = parse_amount_arg)]
    amount: Decimal,

    #[arg(long, default_value = "")]
    reason: String,
}

#[derive(Args)]
struct DeleteArgs {
    /// Transaction id, or a unique prefix of it
    id: String,
}

#[derive(Args)]
struct UiArgs {
    /// Skip the identity screen
    #[arg(long = "as")]
    user: Option<String>,
}

fn parse_kind(s: &str) -> Result<TransactionKind, ValidationError> {
    s.parse()
}

fn parse_amount_arg(s: &str) -> Result<Decimal, ValidationError> {
    parse_amount(s)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    // .env first, so RUST_LOG from the file reaches the filter
    let env_file = settings::load_dotenv();
    init_tracing();
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    let settings = Settings::from_file(&cli.settings)?;
    let store = SqliteStore::open(&cli.db)?;
    let mut session = Session::new(store, settings);

    match cli.command.unwrap_or(Command::Ui(UiArgs { user: None })) {
        Command::Summary => run_summary(&mut session),
        Command::List(args) => run_list(&mut session, args.limit),
        Command::Add(args) => run_add(&mut session, args),
        Command::Delete(args) => run_delete(&mut session, &args.id),
        Command::Kinds => {
            run_kinds();
            Ok(())
        }
        Command::Ui(args) => run_ui_mode(session, args.user),
    }
}

fn run_summary(session: &mut Session<SqliteStore>) -> Result<()> {
    let summary = session.summary()?;
    let ledger = &summary.ledger;

    println!("📒 Ledger Summary");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{} balance: {}", ledger.party_a.name, format_money(ledger.party_a.balance));
    println!("{} balance: {}", ledger.party_b.name, format_money(ledger.party_b.balance));
    println!();
    println!("🤝 Settlement Suggestion");
    if summary.settlement.is_settled() {
        println!("✅ {}", summary.statement());
    } else {
        println!("💰 {}", summary.statement());
    }

    Ok(())
}

fn run_list(session: &mut Session<SqliteStore>, limit: usize) -> Result<()> {
    let ledger = session.ledger()?;

    if ledger.transactions.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }

    println!("🧾 Recent Transactions");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for tx in ledger.recent(limit) {
        let short_id: String = tx.id.to_string().chars().take(8).collect();
        println!("{}  {}", short_id, tx.describe(&ledger));
    }

    Ok(())
}

fn run_add(session: &mut Session<SqliteStore>, args: AddArgs) -> Result<()> {
    session.login(&args.user)?;
    let tx = session.add_transaction(args.kind, args.amount, &args.reason)?;

    println!("✓ Transaction recorded: {}", tx.id);
    run_summary(session)
}

fn run_delete(session: &mut Session<SqliteStore>, id: &str) -> Result<()> {
    let ledger = session.ledger()?;
    let id = resolve_id(&ledger, id)?;
    let removed = session.delete_transaction(id)?;

    println!(
        "✓ Transaction deleted: {} - {} ({})",
        removed.kind.label(),
        format_money(removed.amount),
        format_timestamp(&removed.timestamp)
    );
    run_summary(session)
}

fn run_kinds() {
    for kind in TransactionKind::ALL {
        println!("{:<18} {}", kind.tag(), kind.label());
    }
}

/// Accept a full UUID or a prefix that matches exactly one transaction
fn resolve_id(ledger: &Ledger, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }

    let prefix = input.trim().to_lowercase();
    if prefix.is_empty() {
        bail!("Transaction id must not be empty");
    }

    let mut matches = ledger
        .transactions
        .iter()
        .filter(|tx| tx.id.to_string().starts_with(&prefix));

    match (matches.next(), matches.next()) {
        (Some(tx), None) => Ok(tx.id),
        (Some(_), Some(_)) => bail!("Id prefix {:?} matches more than one transaction", input),
        (None, _) => Err(anyhow!("No transaction matches id {:?}", input)),
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(mut session: Session<SqliteStore>, user: Option<String>) -> Result<()> {
    if let Some(name) = user {
        session.login(&name)?;
    }

    let mut app = ui::App::new(session)?;
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_session: Session<SqliteStore>, _user: Option<String>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the CLI subcommands: split-tracker --help");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use split_tracker::{PartyRole, Transaction};

    const FIRST: &str = "aaaa1111-0000-4000-8000-000000000001";
    const SECOND: &str = "aaaa2222-0000-4000-8000-000000000002";
    const THIRD: &str = "bbbb3333-0000-4000-8000-000000000003";

    fn ledger_with_fixed_ids() -> Ledger {
        let at = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        [FIRST, SECOND, THIRD]
            .into_iter()
            .fold(Ledger::default(), |ledger, id| {
                let mut tx = Transaction::new(
                    PartyRole::PersonA,
                    TransactionKind::SelfPaidSplit,
                    dec!(10),
                    "",
                    at,
                )
                .unwrap();
                tx.id = Uuid::parse_str(id).unwrap();
                ledger.apply_record(tx).unwrap()
            })
    }

    #[test]
    fn test_resolve_full_id() {
        let ledger = ledger_with_fixed_ids();
        assert_eq!(resolve_id(&ledger, SECOND).unwrap(), Uuid::parse_str(SECOND).unwrap());
    }

    #[test]
    fn test_resolve_unique_prefix() {
        let ledger = ledger_with_fixed_ids();
        let third = Uuid::parse_str(THIRD).unwrap();

        assert_eq!(resolve_id(&ledger, "bbbb").unwrap(), third);
        assert_eq!(resolve_id(&ledger, " BBBB3 ").unwrap(), third);
        assert_eq!(
            resolve_id(&ledger, "aaaa1").unwrap(),
            Uuid::parse_str(FIRST).unwrap()
        );
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let ledger = ledger_with_fixed_ids();
        let err = resolve_id(&ledger, "aaaa").unwrap_err();
        assert!(err.to_string().contains("more than one"));
    }

    #[test]
    fn test_resolve_empty_input() {
        let ledger = ledger_with_fixed_ids();
        assert!(resolve_id(&ledger, "").is_err());
        assert!(resolve_id(&ledger, "   ").is_err());
    }

    #[test]
    fn test_resolve_no_match() {
        let ledger = ledger_with_fixed_ids();
        let err = resolve_id(&ledger, "cccc").unwrap_err();
        assert!(err.to_string().contains("No transaction matches"));
    }
}

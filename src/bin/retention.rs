//! `intake-retention`: delete old inquiry messages from the durable store.

use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Parser;
use inquire::Confirm;

use inquiry_intake::config::db_path_from_env;
use inquiry_intake::inquiries::model::MessageType;
use inquiry_intake::retention::{self, DEFAULT_RETENTION_DAYS, RetentionOptions};
use inquiry_intake::store::LibSqlStore;

#[derive(Parser, Debug)]
#[command(name = "intake-retention", version, about = "Delete inquiry messages older than a cutoff")]
struct Cli {
    /// Delete messages created more than this many days before today (UTC)
    #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
    days: u32,

    /// Delete messages created before this RFC 3339 instant instead
    #[arg(long, value_name = "RFC3339", conflicts_with = "days")]
    before: Option<DateTime<Utc>>,

    /// Only delete messages of this type (quote or contact)
    #[arg(long = "type", value_name = "TYPE")]
    kind: Option<String>,

    /// Only delete messages that have been read
    #[arg(long)]
    read_only: bool,

    /// Only delete messages that have not been read
    #[arg(long)]
    unread_only: bool,

    /// List what would be deleted without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    force: bool,

    /// Database file (defaults to INTAKE_DB_PATH)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
}

impl Cli {
    fn options(&self) -> anyhow::Result<RetentionOptions> {
        let kind = match self.kind.as_deref() {
            Some(raw) => Some(
                raw.parse::<MessageType>()
                    .map_err(|e| anyhow::anyhow!("--type: {e}"))?,
            ),
            None => None,
        };
        let options = RetentionOptions {
            days: self.days,
            before: self.before,
            kind,
            read_only: self.read_only,
            unread_only: self.unread_only,
        };
        options.validate()?;
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let options = cli.options()?;
    let predicate = options.predicate(Utc::now())?;

    let db_path = cli.db.clone().unwrap_or_else(db_path_from_env);
    if !db_path.exists() {
        bail!("database not found at {}", db_path.display());
    }
    let store = LibSqlStore::new_local(&db_path)
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;

    let plan = retention::plan(&store, predicate).await?;
    if plan.is_empty() {
        println!("No messages match; nothing to delete.");
        return Ok(());
    }

    println!("{}", retention::candidate_table(&plan.candidates));
    let cutoff = plan.predicate.cutoff.to_rfc3339_opts(SecondsFormat::Secs, true);
    println!(
        "{} message(s) created before {cutoff}",
        plan.candidates.len()
    );

    if cli.dry_run {
        println!("Dry run: nothing deleted. Pass --before {cutoff} to delete exactly this set.");
        return Ok(());
    }

    if !cli.force {
        let confirmed = Confirm::new(&format!("Delete {} message(s)?", plan.candidates.len()))
            .with_default(false)
            .prompt()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let deleted = retention::execute(&store, &plan).await?;
    println!("Deleted {deleted} message(s).");
    if deleted < plan.candidates.len() {
        println!(
            "{} candidate(s) changed since listing and were kept.",
            plan.candidates.len() - deleted
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["intake-retention"]);
        assert_eq!(cli.days, 30);
        assert!(!cli.dry_run && !cli.force);
        assert_eq!(cli.options().unwrap(), RetentionOptions::default());
    }

    #[test]
    fn flags_map_to_options() {
        let cli = Cli::parse_from([
            "intake-retention",
            "--days",
            "7",
            "--type",
            "contact",
            "--read-only",
            "--dry-run",
            "--db",
            "/tmp/x.db",
        ]);
        let options = cli.options().unwrap();
        assert_eq!(options.days, 7);
        assert_eq!(options.kind, Some(MessageType::Contact));
        assert!(options.read_only);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn before_pins_the_cutoff() {
        let cli = Cli::parse_from(["intake-retention", "--before", "2026-05-01T00:00:00Z"]);
        let options = cli.options().unwrap();
        let expected: DateTime<Utc> = "2026-05-01T00:00:00Z".parse().unwrap();
        assert_eq!(options.before, Some(expected));
        assert_eq!(options.predicate(Utc::now()).unwrap().cutoff, expected);
    }

    #[test]
    fn before_conflicts_with_days() {
        let parsed = Cli::try_parse_from([
            "intake-retention",
            "--days",
            "3",
            "--before",
            "2026-05-01T00:00:00Z",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn oversized_days_aborts() {
        let cli = Cli::parse_from(["intake-retention", "--days", "4294967295"]);
        assert!(cli.options().unwrap().predicate(Utc::now()).is_err());
    }

    #[test]
    fn exclusive_flags_abort() {
        let cli = Cli::parse_from(["intake-retention", "--read-only", "--unread-only"]);
        assert!(cli.options().is_err());
    }

    #[test]
    fn unknown_type_aborts() {
        let cli = Cli::parse_from(["intake-retention", "--type", "spam"]);
        assert!(cli.options().is_err());
    }
}

//! Reports, and with `--apply` deletes, accounts whose stored password is
//! not a valid Argon2 hash.

use clap::Parser;
use club_service::config::MongoConfig;
use club_service::services::{sweep_invalid_passwords, MongoDb};
use service_core::observability::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "club-sweep-passwords", version, about)]
struct Args {
    /// MongoDB connection string
    #[arg(long, env = "MONGODB_URI")]
    mongodb_uri: String,

    /// Alternate connection string tried when the primary is unreachable
    #[arg(long, env = "MONGODB_FALLBACK_URI")]
    mongodb_fallback_uri: Option<String>,

    #[arg(long, env = "MONGODB_DATABASE", default_value = "club_events")]
    database: String,

    #[arg(long, env = "MONGODB_SERVER_SELECTION_TIMEOUT_SECS", default_value_t = 10)]
    server_selection_timeout_secs: u64,

    /// Delete the reported accounts instead of only listing them
    #[arg(long)]
    apply: bool,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing("club-sweep-passwords", &args.log_level, None);

    let db = MongoDb::connect(&MongoConfig {
        uri: args.mongodb_uri,
        fallback_uri: args.mongodb_fallback_uri.filter(|s| !s.is_empty()),
        database: args.database,
        server_selection_timeout_secs: args.server_selection_timeout_secs,
    })
    .await?;

    let report = sweep_invalid_passwords(&db, args.apply).await?;

    for account in &report.invalid {
        tracing::info!(
            user_id = %account.id,
            email = %account.email,
            "Account has an unusable stored password"
        );
    }
    tracing::info!(
        scanned = report.scanned,
        invalid = report.invalid.len(),
        deleted = report.deleted,
        apply = args.apply,
        "Password sweep finished"
    );

    if !args.apply && !report.invalid.is_empty() {
        tracing::info!("Dry run; re-run with --apply to delete these accounts");
    }

    Ok(())
}

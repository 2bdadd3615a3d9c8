use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::env;

use dedup_storage::application::ports::DedupRepository;
use dedup_storage::infrastructure::persistence::PostgresDedupRepository;

/// Compare the aggregate metadata row with counters recomputed from blob_records
#[derive(Parser)]
struct Cli {
    #[arg(long)]
    database_url: Option<String>,

    /// Overwrite unique_blobs and total_references with the recomputed values
    #[arg(long)]
    fix: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let db_url = cli
        .database_url
        .or_else(|| env::var("DATABASE_URL").ok())
        .context("DATABASE_URL must be set or passed with --database-url")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await
        .context("failed to connect to database")?;
    let repository = PostgresDedupRepository::new(pool);

    let stored = repository.metadata().await?;
    let actual = repository.summarize().await?;

    println!(
        "unique_blobs:     stored {:>10}  actual {:>10}",
        stored.unique_blobs(),
        actual.unique_blobs
    );
    println!(
        "total_references: stored {:>10}  actual {:>10}",
        stored.total_references(),
        actual.total_references
    );
    println!(
        "duplicates_avoided: {}  bytes_saved: {} (historical, not recomputed)",
        stored.duplicates_avoided(),
        stored.bytes_saved()
    );

    let consistent = stored.unique_blobs() == actual.unique_blobs
        && stored.total_references() == actual.total_references;
    if consistent {
        println!("Metadata is consistent");
        return Ok(());
    }

    println!("Metadata drift detected");
    if cli.fix {
        let repaired = repository.repair_counters().await?;
        println!(
            "Fixed: unique_blobs -> {}, total_references -> {}",
            repaired.unique_blobs(),
            repaired.total_references()
        );
        Ok(())
    } else {
        anyhow::bail!("metadata counters disagree with blob_records; rerun with --fix to repair")
    }
}

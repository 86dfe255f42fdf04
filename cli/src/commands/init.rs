//! `init`: create the database file and table.

use std::path::Path;

use anyhow::Result;

use crate::db::open_repository;

/// Opens (creating if needed) the database and reports its current size.
pub async fn run(db_path: &Path) -> Result<()> {
    let repository = open_repository(db_path)?;
    let stats = repository.stats(None).await?;
    tracing::info!(
        "Comments database initialized at {} ({} comments, {} pending)",
        db_path.display(),
        stats.total,
        stats.pending
    );
    Ok(())
}

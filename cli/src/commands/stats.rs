//! `stats` and `pages`.

use std::{fmt::Write as _, path::Path};

use anyhow::Result;
use locksite_shared::{CommentStats, PageBreakdown};

use crate::db::open_repository;

/// Per-status counts for the whole site or one page.
pub async fn run(db_path: &Path, page: Option<&str>) -> Result<()> {
    let repository = open_repository(db_path)?;
    let stats = repository.stats(page).await?;
    let scope = page.unwrap_or("all pages");
    tracing::info!("{scope}: {}", render_stats(&stats));
    Ok(())
}

/// Counts grouped by page, the database diagnostic view.
pub async fn run_pages(db_path: &Path) -> Result<()> {
    let repository = open_repository(db_path)?;
    let breakdown = repository.page_breakdown().await?;
    tracing::info!("\n{}", render_pages(&breakdown));
    if breakdown.orphans > 0 {
        tracing::warn!("{} replies point at a missing parent", breakdown.orphans);
    }
    Ok(())
}

/// One-line summary.
pub fn render_stats(stats: &CommentStats) -> String {
    format!(
        "total={} pending={} approved={} rejected={}",
        stats.total, stats.pending, stats.approved, stats.rejected
    )
}

/// Fixed-width table, one row per page.
pub fn render_pages(breakdown: &PageBreakdown) -> String {
    let mut out = format!(
        "{:<24} {:>6} {:>8} {:>9} {:>9}\n",
        "PAGE", "TOTAL", "PENDING", "APPROVED", "REJECTED"
    );
    for page in &breakdown.pages {
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>8} {:>9} {:>9}",
            page.page_id,
            page.stats.total,
            page.stats.pending,
            page.stats.approved,
            page.stats.rejected
        );
    }
    let _ = writeln!(out, "orphaned replies: {}", breakdown.orphans);
    out
}

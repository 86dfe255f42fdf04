//! Opens the local comments database.

use std::{path::Path, sync::Arc};

use anyhow::Result;
use locksite_shared::{sqlite_store::SqliteCommentBackend, CommentConfig, CommentRepository};

/// Repository over the SQLite file at `db_path`, created on first use.
/// Moderation settings come from the `COMMENT_*` environment.
pub fn open_repository(db_path: &Path) -> Result<CommentRepository> {
    let backend = SqliteCommentBackend::open(db_path)?;
    Ok(CommentRepository::new(Arc::new(backend), CommentConfig::from_env()))
}

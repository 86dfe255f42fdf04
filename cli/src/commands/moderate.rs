//! Mutating commands: approve, reject, reply, edit-reply, delete.

use std::path::Path;

use anyhow::{bail, Result};
use locksite_shared::{CommentId, ModerationAction, NewReply, ReplyAuthor};

use crate::db::open_repository;

/// Approves or rejects one comment.
pub async fn run(db_path: &Path, id: CommentId, action: ModerationAction) -> Result<()> {
    let repository = open_repository(db_path)?;
    let comment = repository.moderate(id, action).await?;
    tracing::info!("Comment #{} is now {}", comment.id, comment.status);
    Ok(())
}

/// Posts an admin reply under a top-level comment.
pub async fn reply(db_path: &Path, parent_id: CommentId, content: &str) -> Result<()> {
    let repository = open_repository(db_path)?;
    let parent = repository.get(parent_id).await?;
    let reply = repository
        .submit_reply(NewReply {
            parent_id,
            page_id: parent.page_id,
            content: content.to_string(),
            author: ReplyAuthor::Admin,
        })
        .await?;
    tracing::info!("Reply #{} added under comment #{}", reply.id, parent_id);
    Ok(())
}

/// Rewrites the text of an admin reply.
pub async fn edit_reply(db_path: &Path, id: CommentId, content: &str) -> Result<()> {
    let repository = open_repository(db_path)?;
    let reply = repository.update_reply_content(id, content).await?;
    tracing::info!("Reply #{} updated", reply.id);
    Ok(())
}

/// Deletes a comment with its replies. Refuses to run without `--yes`.
pub async fn delete(db_path: &Path, id: CommentId, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("refusing to delete comment #{id} and its replies without --yes");
    }
    let repository = open_repository(db_path)?;
    let outcome = repository.delete(id).await?;
    tracing::info!("Deleted {} rows (comment #{} and its replies)", outcome.deleted, id);
    Ok(())
}

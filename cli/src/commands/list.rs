//! `list` and `threads`.

use std::{fmt::Write as _, path::Path};

use anyhow::Result;
use locksite_shared::{AdminAction, AdminQuery, AdminView, Comment, CommentStatus};

use crate::{cli::OutputFormat, db::open_repository};

const CONTENT_PREVIEW_CHARS: usize = 48;

/// Flat listing with optional status and page filters.
pub async fn run(
    db_path: &Path,
    status: Option<CommentStatus>,
    page: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let repository = open_repository(db_path)?;
    let comments = repository
        .list_filtered(&AdminQuery {
            status,
            page_id: page,
        })
        .await?;

    let formatted = match format {
        OutputFormat::Table => render_table(&comments),
        OutputFormat::Json => serde_json::to_string_pretty(&comments)?,
    };
    tracing::info!("{} comments\n{formatted}", comments.len());
    Ok(())
}

/// Threaded listing with the admin actions available on each row.
pub async fn run_threads(
    db_path: &Path,
    status: Option<CommentStatus>,
    page: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let repository = open_repository(db_path)?;
    let view = repository
        .admin_view(&AdminQuery {
            status,
            page_id: page,
        })
        .await?;

    let formatted = match format {
        OutputFormat::Table => render_threads(&view),
        OutputFormat::Json => serde_json::to_string_pretty(&view)?,
    };
    tracing::info!("{} threads\n{formatted}", view.threads.len());
    Ok(())
}

/// Fixed-width table, one row per comment.
pub fn render_table(comments: &[Comment]) -> String {
    let mut out = format!(
        "{:<6} {:<9} {:<8} {:<20} {:<20} {:<17} {}\n",
        "ID", "STATUS", "AUTHOR", "PAGE", "NICKNAME", "CREATED", "CONTENT"
    );
    for comment in comments {
        let _ = writeln!(
            out,
            "{:<6} {:<9} {:<8} {:<20} {:<20} {:<17} {}",
            comment.id,
            comment.status,
            comment.author_kind,
            preview(&comment.page_id, 20),
            preview(&comment.nickname, 20),
            comment.created_at.format("%Y-%m-%d %H:%M"),
            preview(&comment.content, CONTENT_PREVIEW_CHARS),
        );
    }
    out
}

/// Indented tree: roots, their replies, then orphans.
pub fn render_threads(view: &AdminView) -> String {
    let mut out = String::new();
    for thread in &view.threads {
        let _ = writeln!(out, "{}", describe(&thread.comment, &thread.actions));
        for reply in &thread.replies {
            let _ = writeln!(out, "  └─ {}", describe(&reply.comment, &reply.actions));
        }
    }
    if !view.orphans.is_empty() {
        let _ = writeln!(out, "orphaned replies:");
        for orphan in &view.orphans {
            let parent = orphan
                .parent_id
                .map(|id| id.to_string())
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  #{} -> missing #{parent} [{}] {}",
                orphan.id,
                orphan.status,
                preview(&orphan.content, CONTENT_PREVIEW_CHARS)
            );
        }
    }
    out
}

fn describe(comment: &Comment, actions: &[AdminAction]) -> String {
    let actions = actions
        .iter()
        .map(|action| match action {
            AdminAction::Approve => "approve",
            AdminAction::Reject => "reject",
            AdminAction::Reply => "reply",
            AdminAction::EditReply => "edit-reply",
            AdminAction::Delete => "delete",
        })
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "#{} [{}] {} ({}) on {}: {}  <{actions}>",
        comment.id,
        comment.status,
        comment.nickname,
        comment.author_kind,
        comment.page_id,
        preview(&comment.content, CONTENT_PREVIEW_CHARS)
    )
}

fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let mut cut: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("kısa", 10), "kısa");
        assert_eq!(preview("çilingir hizmeti", 5), "çili…");
        assert_eq!(preview("line\nbreak", 20), "line break");
    }
}

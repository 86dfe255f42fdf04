//! Subcommand implementations.

pub mod init;
pub mod list;
pub mod moderate;
pub mod stats;

use anyhow::Result;
use locksite_shared::{CommentId, ModerationAction};

use crate::cli::{Cli, Commands};

/// Dispatches a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init {
            db_path,
        } => init::run(&db_path).await,
        Commands::List {
            db_path,
            status,
            page,
            format,
        } => list::run(&db_path, status.map(Into::into), page, format).await,
        Commands::Threads {
            db_path,
            page,
            status,
            format,
        } => list::run_threads(&db_path, status.map(Into::into), page, format).await,
        Commands::Stats {
            db_path,
            page,
        } => stats::run(&db_path, page.as_deref()).await,
        Commands::Approve {
            db_path,
            id,
        } => moderate::run(&db_path, CommentId(id), ModerationAction::Approve).await,
        Commands::Reject {
            db_path,
            id,
        } => moderate::run(&db_path, CommentId(id), ModerationAction::Reject).await,
        Commands::Reply {
            db_path,
            id,
            content,
        } => moderate::reply(&db_path, CommentId(id), &content).await,
        Commands::EditReply {
            db_path,
            id,
            content,
        } => moderate::edit_reply(&db_path, CommentId(id), &content).await,
        Commands::Delete {
            db_path,
            id,
            yes,
        } => moderate::delete(&db_path, CommentId(id), yes).await,
        Commands::Pages {
            db_path,
        } => stats::run_pages(&db_path).await,
    }
}

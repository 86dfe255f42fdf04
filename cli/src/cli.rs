//! Argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use locksite_shared::CommentStatus;

/// How listings are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Fixed-width columns.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// Moderation state accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Awaiting review.
    Pending,
    /// Published.
    Approved,
    /// Hidden.
    Rejected,
}

impl From<StatusArg> for CommentStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => CommentStatus::Pending,
            StatusArg::Approved => CommentStatus::Approved,
            StatusArg::Rejected => CommentStatus::Rejected,
        }
    }
}

/// Top-level parser.
#[derive(Parser)]
#[command(name = "locksite-cli", version, about = "Locksite comment moderation CLI")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Every subcommand.
#[derive(Subcommand)]
pub enum Commands {
    /// Create the comments database and table.
    Init {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
    },
    /// List comments, newest first.
    List {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
        /// Only comments in this state.
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Only comments on this page.
        #[arg(long)]
        page: Option<String>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Show comments grouped into threads with their replies.
    Threads {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
        /// Only threads on this page.
        #[arg(long)]
        page: Option<String>,
        /// Only threads containing a comment in this state.
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Print comment counts per status.
    Stats {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
        /// Restrict counts to one page.
        #[arg(long)]
        page: Option<String>,
    },
    /// Publish a comment.
    Approve {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
        /// Comment id.
        id: i64,
    },
    /// Hide a comment.
    Reject {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
        /// Comment id.
        id: i64,
    },
    /// Answer a top-level comment as the site admin.
    Reply {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
        /// Parent comment id.
        id: i64,
        /// Reply text.
        #[arg(long)]
        content: String,
    },
    /// Change the text of an admin reply.
    EditReply {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
        /// Reply id.
        id: i64,
        /// New reply text.
        #[arg(long)]
        content: String,
    },
    /// Delete a comment and all of its replies.
    Delete {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
        /// Comment id.
        id: i64,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Show comment counts grouped by page, plus orphaned replies.
    Pages {
        /// SQLite database path.
        #[arg(long, default_value = "./data/comments.db")]
        db_path: PathBuf,
    },
}

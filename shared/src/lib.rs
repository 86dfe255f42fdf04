//! Comment lifecycle for the locksmith site: data model, moderation,
//! validation, threading and the repository over the two storage backends.

pub mod comment;
pub mod comments_store;
pub mod config;
pub mod error;
pub mod hosted_store;
pub mod moderation;
pub mod sqlite_store;
pub mod storage;
pub mod threading;
pub mod validation;

pub use comment::{
    AuthorKind, ClientInfo, Comment, CommentId, CommentStats, CommentThread, NewComment,
    NewReply, ReplyAuthor,
};
pub use comments_store::{AdminQuery, CommentRepository, DeleteOutcome, PageBreakdown, PageStats};
pub use config::{BackendConfig, CommentConfig};
pub use error::{CommentError, CommentResult, ValidationError};
pub use moderation::{CommentStatus, ModerationAction};
pub use storage::CommentBackend;
pub use threading::{AdminAction, AdminItem, AdminThread, AdminView};
pub use validation::ContentPolicy;

//! Turns flat comment rows into two-level threads.
//!
//! Everything here is pure: callers fetch rows from a backend and hand them
//! over, so the same rules apply to SQLite and the hosted service.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{
    comment::{Comment, CommentId, CommentThread},
    moderation::CommentStatus,
};

/// Something an admin can do to a comment from the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    /// Publish a visitor comment.
    Approve,
    /// Hide a visitor comment.
    Reject,
    /// Answer a top-level comment.
    Reply,
    /// Change the body of an admin reply.
    EditReply,
    /// Remove the comment and its replies.
    Delete,
}

/// Actions offered for `comment` in the admin console.
pub fn allowed_actions(comment: &Comment) -> Vec<AdminAction> {
    let mut actions = Vec::with_capacity(4);
    if comment.is_admin_reply() {
        actions.push(AdminAction::EditReply);
    } else {
        actions.push(AdminAction::Approve);
        actions.push(AdminAction::Reject);
    }
    if comment.is_top_level() {
        actions.push(AdminAction::Reply);
    }
    actions.push(AdminAction::Delete);
    actions
}

/// A reply as shown to moderators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminItem {
    /// The reply row, client info included.
    #[serde(flatten)]
    pub comment: Comment,
    /// Console actions for this reply.
    pub actions: Vec<AdminAction>,
}

impl From<Comment> for AdminItem {
    fn from(comment: Comment) -> Self {
        let actions = allowed_actions(&comment);
        Self { comment, actions }
    }
}

/// A top-level comment with every reply regardless of status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminThread {
    /// The root row.
    #[serde(flatten)]
    pub comment: Comment,
    /// Console actions for the root.
    pub actions: Vec<AdminAction>,
    /// Replies, oldest first.
    pub replies: Vec<AdminItem>,
}

/// Moderation tree for the admin console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminView {
    /// Threads, newest root first.
    pub threads: Vec<AdminThread>,
    /// Replies whose parent is missing or is itself a reply.
    pub orphans: Vec<Comment>,
}

impl AdminView {
    /// Keeps threads whose root or any reply is in `status`.
    pub fn retain_status(&mut self, status: CommentStatus) {
        self.threads.retain(|thread| {
            thread.comment.status == status
                || thread.replies.iter().any(|reply| reply.comment.status == status)
        });
        self.orphans.retain(|orphan| orphan.status == status);
    }

    /// Number of rows in the view, orphans included.
    pub fn len(&self) -> usize {
        self.threads.iter().map(|thread| 1 + thread.replies.len()).sum::<usize>()
            + self.orphans.len()
    }

    /// True when the view holds no rows.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty() && self.orphans.is_empty()
    }
}

/// Splits rows into top-level comments and replies, keeping input order.
pub fn partition(rows: Vec<Comment>) -> (Vec<Comment>, Vec<Comment>) {
    rows.into_iter().partition(Comment::is_top_level)
}

/// Public threads: approved roots newest first, each with its approved
/// replies oldest first. Replies without an approved top-level parent in
/// `rows` are dropped.
pub fn build_public_threads(rows: Vec<Comment>) -> Vec<CommentThread> {
    let approved = rows
        .into_iter()
        .filter(|row| row.status == CommentStatus::Approved)
        .collect();
    let (mut roots, replies) = partition(approved);
    sort_newest_first(&mut roots);

    let mut by_parent = group_replies(replies);
    roots
        .into_iter()
        .map(|comment| {
            let replies = by_parent.remove(&comment.id).unwrap_or_default();
            CommentThread { comment, replies }
        })
        .collect()
}

/// Admin tree over rows of every status.
pub fn build_admin_view(rows: Vec<Comment>) -> AdminView {
    let (mut roots, replies) = partition(rows);
    sort_newest_first(&mut roots);

    let mut by_parent = group_replies(replies);
    let threads = roots
        .into_iter()
        .map(|comment| {
            let replies = by_parent
                .remove(&comment.id)
                .unwrap_or_default()
                .into_iter()
                .map(AdminItem::from)
                .collect();
            AdminThread {
                actions: allowed_actions(&comment),
                comment,
                replies,
            }
        })
        .collect();

    let mut orphans: Vec<Comment> = by_parent.into_values().flatten().collect();
    sort_oldest_first(&mut orphans);
    AdminView { threads, orphans }
}

/// Replies in `rows` whose parent is absent or is not a top-level comment.
pub fn find_orphans(rows: &[Comment]) -> Vec<Comment> {
    let roots: HashSet<CommentId> = rows
        .iter()
        .filter(|row| row.is_top_level())
        .map(|row| row.id)
        .collect();
    let mut orphans: Vec<Comment> = rows
        .iter()
        .filter(|row| row.parent_id.is_some_and(|parent| !roots.contains(&parent)))
        .cloned()
        .collect();
    sort_oldest_first(&mut orphans);
    orphans
}

/// `root` plus every row that descends from it through `parent_id`.
pub fn descendant_ids(rows: &[Comment], root: CommentId) -> Vec<CommentId> {
    let mut ids = vec![root];
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for row in rows.iter().filter(|row| row.parent_id == Some(current)) {
            if seen.insert(row.id) {
                ids.push(row.id);
                queue.push_back(row.id);
            }
        }
    }
    ids
}

/// Newest `created_at` first; equal times fall back to ascending id.
pub fn sort_newest_first(rows: &mut [Comment]) {
    rows.sort_by(|l, r| r.created_at.cmp(&l.created_at).then(l.id.cmp(&r.id)));
}

/// Oldest `created_at` first; equal times fall back to ascending id.
pub fn sort_oldest_first(rows: &mut [Comment]) {
    rows.sort_by(|l, r| l.created_at.cmp(&r.created_at).then(l.id.cmp(&r.id)));
}

fn group_replies(replies: Vec<Comment>) -> BTreeMap<CommentId, Vec<Comment>> {
    let mut by_parent: BTreeMap<CommentId, Vec<Comment>> = BTreeMap::new();
    for reply in replies {
        if let Some(parent) = reply.parent_id {
            by_parent.entry(parent).or_default().push(reply);
        }
    }
    for group in by_parent.values_mut() {
        sort_oldest_first(group);
    }
    by_parent
}

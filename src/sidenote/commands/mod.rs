//! Business logic for each comment operation, one module per command.
//!
//! Commands operate on plain Rust types and make no I/O assumptions; the
//! [`crate::api`] facade wraps each document-touching command with the
//! post-edit range re-derivation. Precondition failures (empty selection,
//! missing parent, read-only document) come back as `Ok(None)` / `false`
//! with a logged warning — callers expect graceful negative results, and
//! only programmer misuse of the store surfaces as a typed error.

use crate::model::{Author, CommentId};

pub mod create;
pub mod delete;
pub mod export;
pub mod import;
pub mod reply;
pub mod text;
pub mod update;

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub author: Author,
    pub from: usize,
    pub to: usize,
    pub mentions: Vec<String>,
    pub tags: Vec<String>,
}

impl NewComment {
    pub fn new(content: impl Into<String>, author: Author, from: usize, to: usize) -> Self {
        Self {
            content: content.into(),
            author,
            from,
            to,
            mentions: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_mentions(mut self, mentions: Vec<String>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewReply {
    pub content: String,
    pub author: Author,
    pub reply_to: CommentId,
    pub mentions: Vec<String>,
    pub tags: Vec<String>,
}

impl NewReply {
    pub fn new(content: impl Into<String>, author: Author, reply_to: CommentId) -> Self {
        Self {
            content: content.into(),
            author,
            reply_to,
            mentions: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_mentions(mut self, mentions: Vec<String>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

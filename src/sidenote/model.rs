use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CommentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub status: CommentStatus,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    // Historical reference: the parent may be deleted later, so the reply also
    // carries snapshots of the parent's author and content at reply time.
    #[serde(default)]
    pub reply_to: Option<CommentId>,
    #[serde(default)]
    pub reply_to_author: Option<Author>,
    #[serde(default)]
    pub reply_to_content: Option<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Comment {
    pub fn new(content: impl Into<String>, author: Author) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            author,
            created_at: Utc::now(),
            updated_at: None,
            status: CommentStatus::Active,
            is_deleted: false,
            deleted_at: None,
            reply_to: None,
            reply_to_author: None,
            reply_to_content: None,
            mentions: Vec::new(),
            tags: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

/// Partial update applied by `CommentStore::update_comment`. Absent fields
/// keep their current value.
#[derive(Debug, Clone, Default)]
pub struct CommentPatch {
    pub content: Option<String>,
    pub status: Option<CommentStatus>,
    pub mentions: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

impl CommentPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn status(status: CommentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// A half-open interval `[from, to)` in document coordinate space.
///
/// Invariant: `from < to`. Zero-length segments never appear in derived
/// ranges because empty spans are dropped during document normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Segment {
    pub from: usize,
    pub to: usize,
}

impl Segment {
    pub fn new(from: usize, to: usize) -> Self {
        debug_assert!(from < to, "segment must be non-empty");
        Self { from, to }
    }

    pub fn len(&self) -> usize {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }

    /// Half-open overlap test against `[from, to)`.
    pub fn overlaps(&self, from: usize, to: usize) -> bool {
        self.from < to && self.to > from
    }

    /// True when the segments overlap or touch end-to-start.
    pub fn touches(&self, other: &Segment) -> bool {
        self.from <= other.to && other.from <= self.to
    }
}

/// Every live span currently carrying one comment id.
///
/// Derived, never authored: the range tracker recomputes these from the
/// document's span marks after each edit. Segments are sorted and disjoint;
/// more than one segment means the anchor has been split apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRange {
    pub comment_id: CommentId,
    pub segments: Vec<Segment>,
}

impl AnchorRange {
    /// Builds a range from raw span occurrences, merging overlapping and
    /// adjacent segments.
    pub fn from_segments(comment_id: CommentId, mut segments: Vec<Segment>) -> Self {
        segments.sort();
        let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
        for seg in segments {
            if let Some(last) = merged.last_mut() {
                if last.touches(&seg) {
                    last.to = last.to.max(seg.to);
                    continue;
                }
            }
            merged.push(seg);
        }
        Self {
            comment_id,
            segments: merged,
        }
    }

    pub fn start(&self) -> Option<usize> {
        self.segments.first().map(|s| s.from)
    }

    pub fn end(&self) -> Option<usize> {
        self.segments.last().map(|s| s.to)
    }

    pub fn is_split(&self) -> bool {
        self.segments.len() > 1
    }

    fn signature_fragment(&self) -> String {
        let segs: Vec<String> = self
            .segments
            .iter()
            .map(|s| format!("{}-{}", s.from, s.to))
            .collect();
        format!("{}:{}", self.comment_id, segs.join(","))
    }
}

/// Deterministic string over all tracked (id, segment-list) pairs.
///
/// Equality of signatures implies no tracked position changed, which is the
/// invalidation test for the range query cache.
pub fn range_signature(ranges: &HashMap<CommentId, AnchorRange>) -> String {
    let mut fragments: Vec<String> = ranges
        .values()
        .filter(|r| !r.segments.is_empty())
        .map(AnchorRange::signature_fragment)
        .collect();
    fragments.sort();
    fragments.join(";")
}

//! # Sync / Validator
//!
//! Cross-checks the two independently-mutable projections of the comment id
//! space: the document's span marks (via the range tracker) and the entity
//! store. The check is a pure diagnostic — it never repairs anything,
//! because silent auto-fix could destroy user intent (resurrecting a
//! deliberately removed annotation, for instance). Repair is a separate,
//! explicit, caller-invoked action: [`cleanup_orphaned_anchors`].
//!
//! Scheduling lives in [`SyncDebouncer`]: validation after every keystroke
//! would be O(document) per key, so runs are debounced, with at most one
//! pending deadline — scheduling again supersedes the previous deadline
//! rather than queuing. The engine bypasses the debounce entirely for
//! undo/redo edits, which can move or destroy many anchors in one step.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::warn;

use crate::doc::{Document, Edit, EditOp, Mark};
use crate::model::{AnchorRange, CommentId, Segment};
use crate::store::CommentStore;
use crate::tracker::RangeTracker;

/// Structural drift between store and document, as three id lists.
///
/// - `deleted`: store entities whose anchor text is gone from the document
/// - `split`: anchors whose live coverage has become disjoint segments
/// - `orphaned`: anchors in the document with no backing store entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub deleted: Vec<CommentId>,
    pub split: Vec<CommentId>,
    pub orphaned: Vec<CommentId>,
}

impl SyncReport {
    pub fn is_consistent(&self) -> bool {
        self.deleted.is_empty() && self.split.is_empty() && self.orphaned.is_empty()
    }
}

/// On-demand consistency check. Split detection deliberately rescans the raw
/// document rather than trusting the tracker's already-merged ranges.
pub fn check_sync(doc: &Document, store: &CommentStore, tracker: &RangeTracker) -> SyncReport {
    let mut report = SyncReport::default();

    // 1. Deleted: a live entity whose anchor text is gone. Replies never
    //    own an anchor (they resolve through their parent), so only
    //    top-level entities can lose one.
    for comment in store.export_comments() {
        if !comment.is_deleted
            && comment.reply_to.is_none()
            && tracker.range_of(&comment.id).is_none()
        {
            report.deleted.push(comment.id);
        }
    }

    // 2. Orphaned: a surviving span with no entity record at all. A
    //    tombstoned entity still counts as a record.
    for id in tracker.ranges().keys() {
        if store.get_comment(id).is_none() {
            report.orphaned.push(*id);
        }
    }

    // 3. Split: merge the raw occurrences per id; more than one merged group
    //    means the anchor has broken into disjoint pieces.
    let mut grouped: HashMap<CommentId, Vec<Segment>> = HashMap::new();
    for (id, segment) in doc.comment_spans() {
        grouped.entry(id).or_default().push(segment);
    }
    for (id, segments) in grouped {
        if AnchorRange::from_segments(id, segments).is_split() {
            report.split.push(id);
        }
    }

    report.deleted.sort();
    report.split.sort();
    report.orphaned.sort();
    report
}

/// Thin boolean view over [`check_sync`].
pub fn validate_comment_ranges(
    doc: &Document,
    store: &CommentStore,
    tracker: &RangeTracker,
) -> bool {
    check_sync(doc, store, tracker).is_consistent()
}

/// Explicit repair for orphaned anchors: strips only the orphaned ids' marks
/// from every matching span in one batched edit, leaving co-located marks
/// untouched. A no-op on read-only documents. Calling it twice in a row
/// returns an empty list the second time.
pub fn cleanup_orphaned_anchors(doc: &mut Document, store: &CommentStore) -> Vec<CommentId> {
    if !doc.is_editable() {
        return Vec::new();
    }
    let orphaned: Vec<(CommentId, Segment)> = doc
        .comment_spans()
        .into_iter()
        .filter(|(id, _)| store.get_comment(id).is_none())
        .collect();
    if orphaned.is_empty() {
        return Vec::new();
    }
    let ops: Vec<EditOp> = orphaned
        .iter()
        .map(|(id, segment)| EditOp::RemoveMark {
            from: segment.from,
            to: segment.to,
            mark: Mark::Comment(*id),
        })
        .collect();
    if let Err(err) = doc.apply(&Edit::new(ops)) {
        warn!("cleanup_orphaned_anchors: batched edit rejected: {err}");
        return Vec::new();
    }
    let mut ids: Vec<CommentId> = orphaned.into_iter().map(|(id, _)| id).collect();
    ids.sort();
    ids.dedup();
    ids
}

pub const DEFAULT_SYNC_DEBOUNCE: Duration = Duration::from_millis(100);

/// One live deadline at most; scheduling again supersedes it.
#[derive(Debug)]
pub struct SyncDebouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Default for SyncDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_DEBOUNCE)
    }
}

impl SyncDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consumes the deadline if it has passed.
    pub fn take_due(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

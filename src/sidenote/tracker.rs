//! # Range Tracker
//!
//! After every applied edit, re-derives the live annotation coverage per
//! comment id from the document's span marks. Anchor ranges are derived,
//! never authored: a full rescan is a pure function of the current document
//! state, which keeps the tracker correct under arbitrary edits, undo and
//! redo included. (Incremental remapping through the host's position mapping
//! would be an optimization, not a correctness requirement.)
//!
//! Adjacent and overlapping spans sharing a comment id merge into one
//! segment; spans separated by unrelated content stay distinct, which is
//! exactly the signal the validator uses to detect a split anchor.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use crate::doc::Document;
use crate::model::{range_signature, AnchorRange, CommentId, Segment};

/// How long an emphasized comment stays emphasized. Presentation concern:
/// the tracker exposes the flag, it never acts on it.
pub const EMPHASIS_TTL: Duration = Duration::from_millis(1500);

pub struct RangeTracker {
    ranges: HashMap<CommentId, AnchorRange>,
    signature: String,
    emphasized: Option<(CommentId, Instant)>,
}

impl Default for RangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeTracker {
    pub fn new() -> Self {
        Self {
            ranges: HashMap::new(),
            signature: String::new(),
            emphasized: None,
        }
    }

    /// Full scan of the document's annotated spans, grouping and merging by
    /// comment id. Returns true when any tracked position changed.
    pub fn rescan(&mut self, doc: &Document) -> bool {
        let mut grouped: HashMap<CommentId, Vec<Segment>> = HashMap::new();
        for (id, segment) in doc.comment_spans() {
            grouped.entry(id).or_default().push(segment);
        }
        let ranges: HashMap<CommentId, AnchorRange> = grouped
            .into_iter()
            .map(|(id, segments)| (id, AnchorRange::from_segments(id, segments)))
            .collect();
        let signature = range_signature(&ranges);
        let changed = signature != self.signature;
        if changed {
            debug!("tracked ranges changed: {} anchored comment(s)", ranges.len());
        }
        self.ranges = ranges;
        self.signature = signature;
        changed
    }

    pub fn ranges(&self) -> &HashMap<CommentId, AnchorRange> {
        &self.ranges
    }

    pub fn range_of(&self, id: &CommentId) -> Option<&AnchorRange> {
        self.ranges.get(id)
    }

    /// Deterministic summary of all tracked id→segment mappings. Equality
    /// means no tracked position changed since the last rescan.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn set_emphasized(&mut self, id: CommentId) {
        self.emphasized = Some((id, Instant::now()));
    }

    pub fn clear_emphasized(&mut self) {
        self.emphasized = None;
    }

    /// The currently emphasized comment, auto-expiring after
    /// [`EMPHASIS_TTL`].
    pub fn emphasized(&self) -> Option<CommentId> {
        self.emphasized
            .filter(|(_, since)| since.elapsed() < EMPHASIS_TTL)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{Edit, EditOp, Mark};
    use uuid::Uuid;

    #[test]
    fn rescan_merges_same_id_spans() {
        let mut doc = Document::from_text("one two three");
        let id = Uuid::new_v4();
        // Two touching mark writes end up as one segment.
        doc.apply(&Edit::new(vec![
            EditOp::AddMark {
                from: 0,
                to: 3,
                mark: Mark::Comment(id),
            },
            EditOp::AddMark {
                from: 3,
                to: 7,
                mark: Mark::Comment(id),
            },
        ]))
        .unwrap();

        let mut tracker = RangeTracker::new();
        assert!(tracker.rescan(&doc));
        let range = tracker.range_of(&id).unwrap();
        assert_eq!(range.segments, vec![Segment::new(0, 7)]);
        assert!(!range.is_split());
    }

    #[test]
    fn signature_is_stable_across_no_op_rescans() {
        let mut doc = Document::from_text("stable text");
        let id = Uuid::new_v4();
        doc.apply(&Edit::single(EditOp::AddMark {
            from: 0,
            to: 6,
            mark: Mark::Comment(id),
        }))
        .unwrap();

        let mut tracker = RangeTracker::new();
        assert!(tracker.rescan(&doc));
        let sig = tracker.signature().to_string();
        assert!(!tracker.rescan(&doc));
        assert_eq!(tracker.signature(), sig);
    }

    #[test]
    fn edits_move_the_signature() {
        let mut doc = Document::from_text("stable text");
        let id = Uuid::new_v4();
        doc.apply(&Edit::single(EditOp::AddMark {
            from: 7,
            to: 11,
            mark: Mark::Comment(id),
        }))
        .unwrap();
        let mut tracker = RangeTracker::new();
        tracker.rescan(&doc);

        doc.apply(&Edit::single(EditOp::InsertText {
            at: 0,
            text: "very ".into(),
        }))
        .unwrap();
        assert!(tracker.rescan(&doc));
        assert_eq!(
            tracker.range_of(&id).unwrap().segments,
            vec![Segment::new(12, 16)]
        );
    }

    #[test]
    fn emphasis_is_transient() {
        let mut tracker = RangeTracker::new();
        let id = Uuid::new_v4();
        assert_eq!(tracker.emphasized(), None);
        tracker.set_emphasized(id);
        assert_eq!(tracker.emphasized(), Some(id));
        tracker.clear_emphasized();
        assert_eq!(tracker.emphasized(), None);
    }
}

//! # API Facade
//!
//! [`SidenoteApi`] is the single entry point for comment operations, in the
//! same role the command layer's callers play elsewhere: it dispatches to
//! `commands/*`, owns the document/store/tracker trio, and carries no
//! business logic of its own.
//!
//! More importantly, it is the edit pipeline. Every document mutation —
//! host edits via [`SidenoteApi::dispatch`], comment creation, anchor
//! removal, orphan cleanup, import — funnels through one post-edit step
//! that re-derives the tracked ranges and schedules (or, for undo/redo,
//! immediately runs) the sync validator. Callers that mutate the document
//! behind the facade's back get stale ranges until the next dispatch; that
//! is the one contract the host has to keep.

use std::collections::HashMap;
use std::time::Duration;

use log::warn;

use crate::commands::export::DocumentExport;
use crate::commands::{self, NewComment, NewReply};
use crate::doc::{Document, Edit, EditMeta};
use crate::error::Result;
use crate::model::{
    AnchorRange, Comment, CommentId, CommentPatch, CommentStatus,
};
use crate::store::{CommentStore, StoreChange, SubscriptionId};
use crate::sync::{self, SyncDebouncer, SyncReport};
use crate::tracker::RangeTracker;

/// Controls the post-import reconciliation pass.
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Run an immediate synchronous validation (plus the no-op edit that
    /// re-derives ranges) after the payload is applied. On by default.
    pub validate: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

pub struct SidenoteApi {
    doc: Document,
    store: CommentStore,
    tracker: RangeTracker,
    debouncer: SyncDebouncer,
    last_report: Option<SyncReport>,
}

impl SidenoteApi {
    /// Attaches to a document. The first attachment performs one full scan
    /// of the annotated spans; everything after that is per-edit rescans.
    pub fn new(doc: Document) -> Self {
        Self::with_debounce(doc, sync::DEFAULT_SYNC_DEBOUNCE)
    }

    pub fn with_debounce(doc: Document, delay: Duration) -> Self {
        let mut tracker = RangeTracker::new();
        tracker.rescan(&doc);
        Self {
            doc,
            store: CommentStore::new(),
            tracker,
            debouncer: SyncDebouncer::new(delay),
            last_report: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.doc.set_read_only(read_only);
    }

    /// Applies a host edit and runs the post-edit step.
    pub fn dispatch(&mut self, edit: Edit) -> Result<()> {
        self.doc.apply(&edit)?;
        self.after_edit(&edit.meta);
        Ok(())
    }

    /// Drives the cooperative scheduler: runs a due debounced validation.
    /// Call from the host's idle loop.
    pub fn poll(&mut self) {
        if self.debouncer.take_due() {
            self.run_validation();
        }
    }

    // ----- comment operations -----

    pub fn create_comment(&mut self, new: NewComment) -> Result<Option<Comment>> {
        let created = commands::create::run(&mut self.doc, &mut self.store, new)?;
        if created.is_some() {
            self.after_edit(&EditMeta::default());
        }
        Ok(created)
    }

    pub fn delete_comment(&mut self, id: CommentId) -> Result<bool> {
        let deleted = commands::delete::run(&mut self.doc, &mut self.store, id)?;
        if deleted {
            self.after_edit(&EditMeta::default());
        }
        Ok(deleted)
    }

    pub fn update_comment(&mut self, id: CommentId, patch: CommentPatch) -> Result<Comment> {
        commands::update::run(&mut self.store, id, patch)
    }

    pub fn create_reply(&mut self, new: NewReply) -> Result<Option<Comment>> {
        commands::reply::run(&mut self.store, new)
    }

    pub fn restore_comment(&mut self, id: &CommentId) -> bool {
        self.store.restore_comment(id)
    }

    pub fn purge_comment(&mut self, id: &CommentId) -> bool {
        self.store.purge_comment(id)
    }

    /// Drops every entity. Anchors still in the document become orphans,
    /// which the next validation run will report.
    pub fn clear_comments(&mut self) {
        self.store.clear();
    }

    pub fn can_create_comment(&self, selection: Option<(usize, usize)>) -> bool {
        commands::text::can_create_comment(&self.doc, selection)
    }

    /// The text currently covered by a comment's anchor, one line per
    /// segment; `fallback` supplies a span for comments the tracker has no
    /// range for.
    pub fn comment_text(&self, id: &CommentId, fallback: Option<(usize, usize)>) -> Option<String> {
        if let Some(range) = self.comment_range(id) {
            return Some(commands::text::comment_text(&self.doc, &range.segments));
        }
        let (from, to) = fallback?;
        (from < to).then(|| self.doc.text_in(from, to))
    }

    /// A comment's live range. Replies carry no anchor of their own and
    /// resolve through their parent at read time, so a reply reflects the
    /// parent anchor's current state — gone or split included — rather than
    /// a stale copy.
    pub fn comment_range(&self, id: &CommentId) -> Option<AnchorRange> {
        if let Some(range) = self.tracker.range_of(id) {
            return Some(range.clone());
        }
        let comment = self.store.get_comment(id)?;
        let parent = comment.reply_to?;
        self.tracker.range_of(&parent).cloned()
    }

    // ----- query surface -----

    pub fn comments_in_range(&mut self, from: usize, to: usize) -> Vec<Comment> {
        self.store
            .comments_in_range(self.tracker.ranges(), from, to)
    }

    pub fn all_comments(&mut self, include_deleted: bool) -> Vec<Comment> {
        self.store.all_comments(include_deleted)
    }

    pub fn comments_by_status(&self, status: CommentStatus) -> Vec<Comment> {
        self.store.comments_by_status(status)
    }

    pub fn get_comment(&self, id: &CommentId) -> Option<&Comment> {
        self.store.get_comment(id)
    }

    pub fn reply_chain(&self, root: CommentId) -> Vec<Comment> {
        self.store.reply_chain(root)
    }

    pub fn anchor_ranges(&self) -> &HashMap<CommentId, AnchorRange> {
        self.tracker.ranges()
    }

    pub fn range_signature(&self) -> &str {
        self.tracker.signature()
    }

    pub fn emphasized_comment(&self) -> Option<CommentId> {
        self.tracker.emphasized()
    }

    pub fn clear_emphasis(&mut self) {
        self.tracker.clear_emphasized();
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&StoreChange) + 'static,
    ) -> SubscriptionId {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.store.unsubscribe(id);
    }

    // ----- validation -----

    /// Runs the validator now, superseding any pending debounced run.
    pub fn check_sync(&mut self) -> SyncReport {
        self.debouncer.cancel();
        self.run_validation();
        self.last_report.clone().unwrap_or_default()
    }

    pub fn is_consistent(&self) -> bool {
        sync::validate_comment_ranges(&self.doc, &self.store, &self.tracker)
    }

    /// The most recent validator result, debounced runs included.
    pub fn last_sync_report(&self) -> Option<&SyncReport> {
        self.last_report.as_ref()
    }

    /// Explicit repair: strips orphaned anchors in one batched edit, then
    /// re-derives ranges. Never invoked automatically.
    pub fn cleanup_orphaned_anchors(&mut self) -> Vec<CommentId> {
        let cleaned = sync::cleanup_orphaned_anchors(&mut self.doc, &self.store);
        if !cleaned.is_empty() {
            self.after_edit(&EditMeta::default());
        }
        cleaned
    }

    // ----- export / import -----

    pub fn export(&self) -> DocumentExport {
        commands::export::run(&self.doc, &self.store)
    }

    pub fn export_json(&self) -> Result<String> {
        commands::export::to_json(&self.doc, &self.store)
    }

    /// Wholesale replacement of document and store — destructive, not a
    /// merge. Cached signatures are dropped with the old store contents, and
    /// unless disabled the freshly-loaded state is reconciled immediately.
    pub fn import(&mut self, export: DocumentExport, options: ImportOptions) -> Result<usize> {
        let DocumentExport { doc, comments, .. } = export;
        self.doc = doc;
        let count = self.store.replace_all(comments);
        self.tracker.rescan(&self.doc);
        if options.validate {
            self.dispatch(Edit::noop())?;
            self.debouncer.cancel();
            self.run_validation();
        }
        Ok(count)
    }

    pub fn import_json(&mut self, json: &str, options: ImportOptions) -> Result<usize> {
        let export = commands::import::parse(json)?;
        self.import(export, options)
    }

    // ----- internals -----

    /// The post-edit step: re-derive ranges, honor the emphasis side
    /// channel, and schedule validation — immediately for undo/redo, since
    /// one such step can resurrect or destroy many anchors and a stale
    /// diagnostic would actively mislead.
    fn after_edit(&mut self, meta: &EditMeta) {
        self.tracker.rescan(&self.doc);
        if let Some(id) = meta.emphasize {
            self.tracker.set_emphasized(id);
        }
        if meta.undo_redo {
            self.debouncer.cancel();
            self.run_validation();
        } else {
            self.debouncer.schedule();
        }
    }

    fn run_validation(&mut self) {
        let report = sync::check_sync(&self.doc, &self.store, &self.tracker);
        if !report.is_consistent() {
            warn!(
                "comment anchors out of sync: {} deleted, {} split, {} orphaned",
                report.deleted.len(),
                report.split.len(),
                report.orphaned.len()
            );
        }
        self.last_report = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{EditOp, Mark};
    use crate::model::Author;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn author() -> Author {
        Author::new("u1", "Ada")
    }

    fn api_with(text: &str) -> SidenoteApi {
        SidenoteApi::with_debounce(Document::from_text(text), Duration::ZERO)
    }

    #[test]
    fn created_comment_is_queryable_over_its_span() {
        let mut api = api_with("some commented words here");
        let created = api
            .create_comment(NewComment::new("note", author(), 5, 14))
            .unwrap()
            .unwrap();

        let hits = api.comments_in_range(5, 14);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, created.id);
        assert_eq!(
            api.comment_text(&created.id, None).as_deref(),
            Some("commented")
        );
    }

    #[test]
    fn undo_redo_bypasses_the_debounce() {
        let mut api = SidenoteApi::with_debounce(
            Document::from_text("abcdef"),
            Duration::from_secs(3600),
        );
        let created = api
            .create_comment(NewComment::new("note", author(), 0, 6))
            .unwrap()
            .unwrap();
        assert!(api.last_sync_report().is_none());

        // An ordinary edit only schedules; the hour-long debounce never fires.
        api.dispatch(Edit::single(EditOp::DeleteRange { from: 0, to: 6 }))
            .unwrap();
        api.poll();
        assert!(api.last_sync_report().is_none());

        // An undo/redo edit validates immediately.
        api.dispatch(Edit::noop().with_undo_redo()).unwrap();
        let report = api.last_sync_report().unwrap();
        assert_eq!(report.deleted, vec![created.id]);
    }

    #[test]
    fn debounced_validation_runs_on_poll() {
        let mut api = api_with("watched text");
        api.create_comment(NewComment::new("note", author(), 0, 7))
            .unwrap()
            .unwrap();
        api.dispatch(Edit::single(EditOp::DeleteRange { from: 0, to: 7 }))
            .unwrap();
        assert!(api.last_sync_report().is_none());
        api.poll();
        let report = api.last_sync_report().unwrap();
        assert_eq!(report.deleted.len(), 1);
    }

    #[test]
    fn emphasis_rides_the_edit_metadata() {
        let mut api = api_with("emphasized");
        let created = api
            .create_comment(NewComment::new("note", author(), 0, 5))
            .unwrap()
            .unwrap();
        api.dispatch(Edit::noop().with_emphasis(created.id)).unwrap();
        assert_eq!(api.emphasized_comment(), Some(created.id));
        api.clear_emphasis();
        assert_eq!(api.emphasized_comment(), None);
    }

    #[test]
    fn reply_resolves_range_through_its_parent() {
        let mut api = api_with("parent anchor text");
        let parent = api
            .create_comment(NewComment::new("parent", author(), 0, 6))
            .unwrap()
            .unwrap();
        let reply = api
            .create_reply(NewReply::new("child", author(), parent.id))
            .unwrap()
            .unwrap();

        assert_eq!(
            api.comment_range(&reply.id),
            api.comment_range(&parent.id)
        );

        // Parent anchor gone: the reply reflects that, not a stale copy.
        api.delete_comment(parent.id).unwrap();
        assert_eq!(api.comment_range(&reply.id), None);
    }

    #[test]
    fn import_validates_unless_disabled() {
        let mut source = api_with("exported anchor");
        source
            .create_comment(NewComment::new("note", author(), 0, 8))
            .unwrap()
            .unwrap();
        let mut payload = source.export();
        // Drop the comment payload to manufacture an orphan.
        payload.comments.clear();

        let mut target = api_with("");
        target.import(payload.clone(), ImportOptions::default()).unwrap();
        assert_eq!(target.last_sync_report().unwrap().orphaned.len(), 1);

        let mut silent = api_with("");
        silent
            .import(payload, ImportOptions { validate: false })
            .unwrap();
        assert!(silent.last_sync_report().is_none());
        assert!(!silent.is_consistent());
    }

    #[test]
    fn store_subscription_reaches_through_the_facade() {
        let mut api = api_with("observed");
        let seen: Rc<RefCell<usize>> = Rc::default();
        let sink = Rc::clone(&seen);
        let sub = api.subscribe(move |_| *sink.borrow_mut() += 1);

        api.create_comment(NewComment::new("note", author(), 0, 8))
            .unwrap()
            .unwrap();
        assert_eq!(*seen.borrow(), 1);
        api.unsubscribe(sub);
        api.unsubscribe(sub);
    }
}

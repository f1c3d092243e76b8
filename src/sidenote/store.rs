//! # Comment Entity Store
//!
//! The authoritative registry of comment entities. The store is
//! position-agnostic: it never reads the document and knows nothing about
//! coordinates except through the externally supplied range map passed to
//! [`CommentStore::comments_in_range`].
//!
//! ## Caching
//!
//! Two caches, both invalidated wholesale rather than per-key:
//!
//! - an immutable snapshot of the non-deleted entities, rebuilt lazily after
//!   any mutation, so repeated listings don't re-filter the map
//! - the range query cache, keyed by `(from, to)` within one signature
//!   epoch: when an incoming range map hashes to a different signature the
//!   whole cache is cleared before evaluating
//!
//! Coarse invalidation trades a little redundant recomputation for an
//! invalidation rule that is trivially correct.
//!
//! ## Change notification
//!
//! `subscribe` registers a listener called synchronously after every
//! mutation, so external reactive layers can bind without depending on any
//! specific framework. Unsubscribing is an idempotent no-op, safe to call
//! repeatedly and after the owning view is gone.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use log::{debug, warn};

use crate::error::{Result, SidenoteError};
use crate::model::{
    range_signature, AnchorRange, Comment, CommentId, CommentPatch, CommentStatus,
};

/// What changed, delivered to subscribers after the mutation is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Added(CommentId),
    Updated(CommentId),
    Deleted(CommentId),
    Restored(CommentId),
    Purged(CommentId),
    Cleared,
    Replaced,
}

pub type SubscriptionId = usize;

type Listener = Box<dyn FnMut(&StoreChange)>;

/// Hit/miss counters for the range query cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
pub struct CommentStore {
    comments: HashMap<CommentId, Comment>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
    snapshot: Option<Vec<Comment>>,
    range_cache: HashMap<(usize, usize), Vec<Comment>>,
    range_sig: Option<String>,
    cache_stats: CacheStats,
}

impl CommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Registers a comment. The id must be globally unique at creation.
    pub fn add_comment(&mut self, comment: Comment) -> Result<()> {
        if self.comments.contains_key(&comment.id) {
            return Err(SidenoteError::DuplicateId(comment.id));
        }
        let id = comment.id;
        self.comments.insert(id, comment);
        self.touch(StoreChange::Added(id));
        Ok(())
    }

    /// Returns the entity, including soft-deleted ones: a tombstone stays
    /// readable until it is purged.
    pub fn get_comment(&self, id: &CommentId) -> Option<&Comment> {
        self.comments.get(id)
    }

    /// Merges the patch and stamps `updated_at`.
    pub fn update_comment(&mut self, id: CommentId, patch: CommentPatch) -> Result<Comment> {
        let comment = self
            .comments
            .get_mut(&id)
            .ok_or(SidenoteError::CommentNotFound(id))?;
        if let Some(content) = patch.content {
            comment.content = content;
        }
        if let Some(status) = patch.status {
            comment.status = status;
        }
        if let Some(mentions) = patch.mentions {
            comment.mentions = mentions;
        }
        if let Some(tags) = patch.tags {
            comment.tags = tags;
        }
        comment.updated_at = Some(Utc::now());
        let updated = comment.clone();
        self.touch(StoreChange::Updated(id));
        Ok(updated)
    }

    /// Soft delete: the entity stays present as a tombstone and disappears
    /// from default listings. Returns false for unknown ids.
    pub fn delete_comment(&mut self, id: &CommentId) -> bool {
        match self.comments.get_mut(id) {
            Some(comment) => {
                comment.is_deleted = true;
                comment.deleted_at = Some(Utc::now());
                self.touch(StoreChange::Deleted(*id));
                true
            }
            None => false,
        }
    }

    pub fn restore_comment(&mut self, id: &CommentId) -> bool {
        match self.comments.get_mut(id) {
            Some(comment) if comment.is_deleted => {
                comment.is_deleted = false;
                comment.deleted_at = None;
                self.touch(StoreChange::Restored(*id));
                true
            }
            _ => false,
        }
    }

    /// Removes the entity for good. The only way a tombstone leaves the map.
    pub fn purge_comment(&mut self, id: &CommentId) -> bool {
        if self.comments.remove(id).is_some() {
            self.touch(StoreChange::Purged(*id));
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.comments.clear();
        self.touch(StoreChange::Cleared);
    }

    pub fn all_comments(&mut self, include_deleted: bool) -> Vec<Comment> {
        if !include_deleted {
            return self.snapshot().to_vec();
        }
        let mut all: Vec<Comment> = self.comments.values().cloned().collect();
        sort_by_creation(&mut all);
        all
    }

    pub fn comments_by_status(&self, status: CommentStatus) -> Vec<Comment> {
        let mut out: Vec<Comment> = self
            .comments
            .values()
            .filter(|c| !c.is_deleted && c.status == status)
            .cloned()
            .collect();
        sort_by_creation(&mut out);
        out
    }

    pub fn replies_to(&self, id: &CommentId) -> Vec<Comment> {
        let mut out: Vec<Comment> = self
            .comments
            .values()
            .filter(|c| !c.is_deleted && c.reply_to == Some(*id))
            .cloned()
            .collect();
        sort_by_creation(&mut out);
        out
    }

    pub fn reply_count(&self, id: &CommentId) -> usize {
        self.comments
            .values()
            .filter(|c| !c.is_deleted && c.reply_to == Some(*id))
            .count()
    }

    pub fn top_level_comments(&self) -> Vec<Comment> {
        let mut out: Vec<Comment> = self
            .comments
            .values()
            .filter(|c| !c.is_deleted && c.reply_to.is_none())
            .cloned()
            .collect();
        sort_by_creation(&mut out);
        out
    }

    /// Depth-first walk of the reply tree from `root`, sorted by creation
    /// time with the root included. Reply links are ordinary user-editable
    /// data, so the walk carries a visited set and terminates even when links
    /// have been corrupted into a cycle. Tombstones are included: a thread
    /// stays intact while a delete is still undoable.
    pub fn reply_chain(&self, root: CommentId) -> Vec<Comment> {
        if !self.comments.contains_key(&root) {
            return Vec::new();
        }
        let mut visited: HashSet<CommentId> = HashSet::new();
        let mut chain: Vec<Comment> = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(comment) = self.comments.get(&id) {
                chain.push(comment.clone());
            }
            for child in self.comments.values().filter(|c| c.reply_to == Some(id)) {
                stack.push(child.id);
            }
        }
        sort_by_creation(&mut chain);
        chain
    }

    /// The one spatial operation: every non-deleted entity with at least one
    /// segment overlapping `[from, to)` in the supplied range map.
    ///
    /// The map comes from the range tracker; the store only compares its
    /// signature against the last one seen. A differing signature clears the
    /// whole query cache before evaluating; within one signature epoch,
    /// repeated identical `(from, to)` queries are served from cache.
    pub fn comments_in_range(
        &mut self,
        ranges: &HashMap<CommentId, AnchorRange>,
        from: usize,
        to: usize,
    ) -> Vec<Comment> {
        let sig = range_signature(ranges);
        if self.range_sig.as_deref() != Some(sig.as_str()) {
            debug!("range signature changed, clearing {} cached queries", self.range_cache.len());
            self.range_cache.clear();
            self.range_sig = Some(sig);
        }
        if let Some(hit) = self.range_cache.get(&(from, to)) {
            self.cache_stats.hits += 1;
            return hit.clone();
        }
        self.cache_stats.misses += 1;
        let mut out: Vec<Comment> = ranges
            .values()
            .filter(|range| range.segments.iter().any(|seg| seg.overlaps(from, to)))
            .filter_map(|range| self.comments.get(&range.comment_id))
            .filter(|comment| !comment.is_deleted)
            .cloned()
            .collect();
        sort_by_creation(&mut out);
        self.range_cache.insert((from, to), out.clone());
        out
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache_stats
    }

    /// Registers a listener notified synchronously after every mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&StoreChange) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Idempotent: unknown and already-removed ids are a no-op.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.listeners.retain(|(sid, _)| *sid != id);
    }

    /// Every comment, tombstones included, in creation order. This is the
    /// persisted form.
    pub fn export_comments(&self) -> Vec<Comment> {
        let mut all: Vec<Comment> = self.comments.values().cloned().collect();
        sort_by_creation(&mut all);
        all
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.export_comments())?)
    }

    /// Replaces the store contents from a serialized comment array.
    /// Entries missing id, content, or author are rejected wholesale.
    pub fn import_json(&mut self, data: &str) -> Result<usize> {
        let comments: Vec<Comment> = serde_json::from_str(data)
            .map_err(|e| SidenoteError::InvalidCommentData(e.to_string()))?;
        Ok(self.replace_all(comments))
    }

    /// Destructive replacement, not a merge: the previous contents and all
    /// cached signatures are gone afterwards.
    pub fn replace_all(&mut self, comments: Vec<Comment>) -> usize {
        let count = comments.len();
        let mut map = HashMap::with_capacity(count);
        for comment in comments {
            if map.insert(comment.id, comment).is_some() {
                warn!("replace_all: duplicate id in imported data, keeping the later entry");
            }
        }
        self.comments = map;
        self.range_sig = None;
        self.touch(StoreChange::Replaced);
        self.comments.len()
    }

    fn snapshot(&mut self) -> &[Comment] {
        if self.snapshot.is_none() {
            let mut visible: Vec<Comment> = self
                .comments
                .values()
                .filter(|c| !c.is_deleted)
                .cloned()
                .collect();
            sort_by_creation(&mut visible);
            self.snapshot = Some(visible);
        }
        self.snapshot.as_deref().unwrap_or(&[])
    }

    /// Invalidates the snapshot and query cache, then notifies listeners.
    fn touch(&mut self, change: StoreChange) {
        self.snapshot = None;
        self.range_cache.clear();
        // Listeners are moved out for the duration of the callbacks;
        // listeners registered from inside a callback are kept.
        let mut listeners = std::mem::take(&mut self.listeners);
        for (_, listener) in listeners.iter_mut() {
            listener(&change);
        }
        let registered_during_notify = std::mem::take(&mut self.listeners);
        self.listeners = listeners;
        self.listeners.extend(registered_during_notify);
    }
}

fn sort_by_creation(comments: &mut [Comment]) {
    comments.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::Author;

    pub fn author() -> Author {
        Author::new("u1", "Ada")
    }

    pub struct StoreFixture {
        pub store: CommentStore,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        pub fn new() -> Self {
            Self {
                store: CommentStore::new(),
            }
        }

        pub fn with_comment(mut self, content: &str) -> Self {
            self.store
                .add_comment(Comment::new(content, author()))
                .unwrap();
            self
        }

        pub fn with_resolved_comment(mut self, content: &str) -> Self {
            let mut comment = Comment::new(content, author());
            comment.status = CommentStatus::Resolved;
            self.store.add_comment(comment).unwrap();
            self
        }

        pub fn with_deleted_comment(mut self, content: &str) -> Self {
            let mut comment = Comment::new(content, author());
            comment.is_deleted = true;
            comment.deleted_at = Some(Utc::now());
            self.store.add_comment(comment).unwrap();
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{author, StoreFixture};
    use super::*;
    use crate::model::Segment;
    use std::cell::RefCell;
    use std::rc::Rc;
    use uuid::Uuid;

    #[test]
    fn duplicate_id_is_rejected() {
        let mut store = CommentStore::new();
        let comment = Comment::new("first", author());
        let id = comment.id;
        store.add_comment(comment.clone()).unwrap();
        match store.add_comment(comment) {
            Err(SidenoteError::DuplicateId(err_id)) => assert_eq!(err_id, id),
            other => panic!("expected DuplicateId, got {other:?}"),
        }
    }

    #[test]
    fn update_missing_comment_is_a_typed_error() {
        let mut store = CommentStore::new();
        let id = Uuid::new_v4();
        match store.update_comment(id, CommentPatch::content("x")) {
            Err(SidenoteError::CommentNotFound(err_id)) => assert_eq!(err_id, id),
            other => panic!("expected CommentNotFound, got {other:?}"),
        }
    }

    #[test]
    fn soft_delete_keeps_entity_readable_until_purge() {
        let fixture = StoreFixture::new().with_comment("keep me");
        let mut store = fixture.store;
        let id = store.all_comments(false)[0].id;

        assert!(store.delete_comment(&id));
        assert!(store.all_comments(false).is_empty());
        assert_eq!(store.all_comments(true).len(), 1);
        assert!(store.get_comment(&id).unwrap().is_deleted);
        assert!(store.get_comment(&id).unwrap().deleted_at.is_some());

        assert!(store.restore_comment(&id));
        assert_eq!(store.all_comments(false).len(), 1);
        assert!(store.get_comment(&id).unwrap().deleted_at.is_none());

        assert!(store.delete_comment(&id));
        assert!(store.purge_comment(&id));
        assert!(store.get_comment(&id).is_none());
        assert!(!store.purge_comment(&id));
    }

    #[test]
    fn status_listing_tracks_updates() {
        let fixture = StoreFixture::new().with_comment("needs work");
        let mut store = fixture.store;
        let id = store.all_comments(false)[0].id;

        assert_eq!(store.comments_by_status(CommentStatus::Active).len(), 1);
        store
            .update_comment(id, CommentPatch::status(CommentStatus::Resolved))
            .unwrap();
        assert!(store.comments_by_status(CommentStatus::Active).is_empty());
        let resolved = store.comments_by_status(CommentStatus::Resolved);
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].updated_at.is_some());
    }

    #[test]
    fn reply_chain_is_ordered_and_cycle_safe() {
        let mut store = CommentStore::new();
        let mut a = Comment::new("root", author());
        a.created_at = Utc::now() - chrono::Duration::seconds(30);
        let mut b = Comment::new("first reply", author());
        b.reply_to = Some(a.id);
        b.created_at = Utc::now() - chrono::Duration::seconds(20);
        let mut c = Comment::new("second reply", author());
        c.reply_to = Some(b.id);
        c.created_at = Utc::now() - chrono::Duration::seconds(10);

        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        store.add_comment(a).unwrap();
        store.add_comment(b).unwrap();
        store.add_comment(c).unwrap();

        let chain: Vec<CommentId> = store.reply_chain(a_id).iter().map(|c| c.id).collect();
        assert_eq!(chain, vec![a_id, b_id, c_id]);
        assert_eq!(store.reply_count(&a_id), 1);
        assert_eq!(store.top_level_comments().len(), 1);

        // Corrupt the links into a cycle; the walk must still terminate.
        store.comments.get_mut(&b_id).unwrap().reply_to = Some(c_id);
        store.comments.get_mut(&c_id).unwrap().reply_to = Some(b_id);
        let chain = store.reply_chain(b_id);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn range_query_caches_within_a_signature_epoch() {
        let fixture = StoreFixture::new().with_comment("anchored");
        let mut store = fixture.store;
        let id = store.all_comments(false)[0].id;

        let mut ranges = HashMap::new();
        ranges.insert(id, AnchorRange::from_segments(id, vec![Segment::new(5, 10)]));

        let first = store.comments_in_range(&ranges, 0, 7);
        let second = store.comments_in_range(&ranges, 0, 7);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        let stats = store.cache_stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));

        // Miss outside the segment, half-open semantics.
        assert!(store.comments_in_range(&ranges, 10, 20).is_empty());
        assert!(store.comments_in_range(&ranges, 0, 5).is_empty());
    }

    #[test]
    fn signature_change_clears_the_query_cache() {
        let fixture = StoreFixture::new().with_comment("anchored");
        let mut store = fixture.store;
        let id = store.all_comments(false)[0].id;

        let mut ranges = HashMap::new();
        ranges.insert(id, AnchorRange::from_segments(id, vec![Segment::new(5, 10)]));
        store.comments_in_range(&ranges, 0, 7);

        ranges.insert(id, AnchorRange::from_segments(id, vec![Segment::new(8, 13)]));
        store.comments_in_range(&ranges, 0, 7);
        let stats = store.cache_stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn store_mutation_invalidates_the_query_cache() {
        let fixture = StoreFixture::new().with_comment("anchored");
        let mut store = fixture.store;
        let id = store.all_comments(false)[0].id;

        let mut ranges = HashMap::new();
        ranges.insert(id, AnchorRange::from_segments(id, vec![Segment::new(0, 4)]));
        assert_eq!(store.comments_in_range(&ranges, 0, 4).len(), 1);

        store.delete_comment(&id);
        assert!(store.comments_in_range(&ranges, 0, 4).is_empty());
    }

    #[test]
    fn listeners_fire_synchronously_and_unsubscribe_is_idempotent() {
        let mut store = CommentStore::new();
        let seen: Rc<RefCell<Vec<StoreChange>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let sub = store.subscribe(move |change| sink.borrow_mut().push(*change));

        let comment = Comment::new("hello", author());
        let id = comment.id;
        store.add_comment(comment).unwrap();
        store.delete_comment(&id);

        assert_eq!(
            *seen.borrow(),
            vec![StoreChange::Added(id), StoreChange::Deleted(id)]
        );

        store.unsubscribe(sub);
        store.unsubscribe(sub);
        store.restore_comment(&id);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn import_rejects_malformed_entries() {
        let mut store = CommentStore::new();
        let err = store
            .import_json(r#"[{"content": "no id or author"}]"#)
            .unwrap_err();
        assert!(matches!(err, SidenoteError::InvalidCommentData(_)));

        let round_trip = {
            let fixture = StoreFixture::new().with_comment("a").with_deleted_comment("b");
            fixture.store.to_json().unwrap()
        };
        assert_eq!(store.import_json(&round_trip).unwrap(), 2);
        assert_eq!(store.all_comments(true).len(), 2);
        assert_eq!(store.all_comments(false).len(), 1);
    }
}

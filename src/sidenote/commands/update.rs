use crate::error::Result;
use crate::model::{Comment, CommentId, CommentPatch};
use crate::store::CommentStore;

/// Store-only update: content and status changes never move the anchor, so
/// the document is not touched. Missing ids are programmer misuse and come
/// back as a typed error.
pub fn run(store: &mut CommentStore, id: CommentId, patch: CommentPatch) -> Result<Comment> {
    store.update_comment(id, patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SidenoteError;
    use crate::model::{Author, CommentStatus};

    #[test]
    fn stamps_updated_at() {
        let mut store = CommentStore::new();
        let comment = Comment::new("draft", Author::new("u1", "Ada"));
        let id = comment.id;
        store.add_comment(comment).unwrap();

        let updated = run(&mut store, id, CommentPatch::status(CommentStatus::Resolved)).unwrap();
        assert_eq!(updated.status, CommentStatus::Resolved);
        assert!(updated.updated_at.is_some());
        assert_eq!(updated.content, "draft");
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut store = CommentStore::new();
        let comment = Comment::new("draft", Author::new("u1", "Ada"));
        let id = comment.id;
        store.add_comment(comment).unwrap();

        let patch = CommentPatch {
            mentions: Some(vec!["brook".into()]),
            tags: Some(vec!["todo".into()]),
            ..CommentPatch::default()
        };
        let updated = run(&mut store, id, patch).unwrap();
        assert_eq!(updated.mentions, vec!["brook".to_string()]);
        assert_eq!(updated.tags, vec!["todo".to_string()]);
        assert_eq!(updated.content, "draft");
        assert_eq!(updated.status, CommentStatus::Active);
    }

    #[test]
    fn missing_id_is_an_error() {
        let mut store = CommentStore::new();
        let err = run(&mut store, uuid::Uuid::new_v4(), CommentPatch::default()).unwrap_err();
        assert!(matches!(err, SidenoteError::CommentNotFound(_)));
    }
}

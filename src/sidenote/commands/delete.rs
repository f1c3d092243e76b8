use log::warn;

use crate::doc::{Document, Edit, EditOp, Mark};
use crate::error::Result;
use crate::model::CommentId;
use crate::store::CommentStore;

/// Removes a comment's anchor and soft-deletes its entity.
///
/// The document is scanned fresh for every span carrying the id — never a
/// possibly-stale cached range — and only that id's mark is stripped, in one
/// batched edit that leaves co-located marks in place. When no span matches
/// (prior desync), the entity is still soft-deleted and the call succeeds.
pub fn run(doc: &mut Document, store: &mut CommentStore, id: CommentId) -> Result<bool> {
    if store.get_comment(&id).is_none() {
        warn!("delete_comment: unknown comment {id}");
        return Ok(false);
    }

    let ops: Vec<EditOp> = doc
        .comment_spans()
        .into_iter()
        .filter(|(span_id, _)| *span_id == id)
        .map(|(_, segment)| EditOp::RemoveMark {
            from: segment.from,
            to: segment.to,
            mark: Mark::Comment(id),
        })
        .collect();

    if ops.is_empty() {
        warn!("delete_comment: no anchor found for {id}, removing entity only");
    } else if let Err(err) = doc.apply(&Edit::new(ops)) {
        // Keep going: a read-only document should not strand the entity.
        warn!("delete_comment: anchor removal rejected ({err}), removing entity only");
    }

    Ok(store.delete_comment(&id))
}

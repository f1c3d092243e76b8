use log::warn;

use crate::commands::NewComment;
use crate::doc::{Document, Edit, EditOp, Mark};
use crate::error::Result;
use crate::model::Comment;
use crate::store::CommentStore;

/// Creates a comment anchored to `[from, to)`.
///
/// The annotation write and the store registration are one atomic action:
/// if the document edit cannot be applied, the store is never touched and
/// the call returns `None`. A collapsed span is a precondition failure, not
/// an error.
pub fn run(doc: &mut Document, store: &mut CommentStore, new: NewComment) -> Result<Option<Comment>> {
    if new.from == new.to {
        warn!("create_comment: selection is empty at {}", new.from);
        return Ok(None);
    }
    let mut comment = Comment::new(new.content, new.author);
    comment.mentions = new.mentions;
    comment.tags = new.tags;

    let edit = Edit::single(EditOp::AddMark {
        from: new.from,
        to: new.to,
        mark: Mark::Comment(comment.id),
    });
    if let Err(err) = doc.apply(&edit) {
        warn!("create_comment: document edit rejected: {err}");
        return Ok(None);
    }
    store.add_comment(comment.clone())?;
    Ok(Some(comment))
}

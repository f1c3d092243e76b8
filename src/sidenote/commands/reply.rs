use log::warn;

use crate::commands::NewReply;
use crate::error::Result;
use crate::model::Comment;
use crate::store::CommentStore;

/// The parent content snapshot keeps at most this many characters.
pub const REPLY_SNIPPET_LEN: usize = 50;

/// Creates a reply to an existing comment.
///
/// A reply carries no document anchor of its own — giving it one would need
/// an independent selection, or risk silently overwriting the parent's
/// anchor. Instead it stores the parent id plus snapshots of the parent's
/// author and (truncated) content, so the reference stays meaningful even
/// after the parent is edited or deleted.
pub fn run(store: &mut CommentStore, new: NewReply) -> Result<Option<Comment>> {
    let Some(parent) = store.get_comment(&new.reply_to) else {
        warn!("create_reply: parent {} not found", new.reply_to);
        return Ok(None);
    };
    let parent_author = parent.author.clone();
    let parent_snippet = snippet(&parent.content);

    let mut comment = Comment::new(new.content, new.author);
    comment.reply_to = Some(new.reply_to);
    comment.reply_to_author = Some(parent_author);
    comment.reply_to_content = Some(parent_snippet);
    comment.mentions = new.mentions;
    comment.tags = new.tags;

    store.add_comment(comment.clone())?;
    Ok(Some(comment))
}

fn snippet(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(REPLY_SNIPPET_LEN).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::doc::Document;
use crate::error::Result;
use crate::model::Comment;
use crate::store::CommentStore;

pub const EXPORT_VERSION: &str = "1";

/// The interchange format: a document snapshot (inline anchors included)
/// plus the full comment array, tombstones and all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentExport {
    pub doc: Document,
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

pub fn run(doc: &Document, store: &CommentStore) -> DocumentExport {
    DocumentExport {
        doc: doc.clone(),
        comments: store.export_comments(),
        exported_at: Some(Utc::now()),
        version: Some(EXPORT_VERSION.to_string()),
    }
}

pub fn to_json(doc: &Document, store: &CommentStore) -> Result<String> {
    Ok(serde_json::to_string(&run(doc, store))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{create, NewComment};
    use crate::model::Author;

    #[test]
    fn export_carries_document_and_all_comments() {
        let mut doc = Document::from_text("exported text");
        let mut store = CommentStore::new();
        let created = create::run(
            &mut doc,
            &mut store,
            NewComment::new("note", Author::new("u1", "Ada"), 0, 8),
        )
        .unwrap()
        .unwrap();
        store.delete_comment(&created.id);

        let export = run(&doc, &store);
        assert_eq!(export.comments.len(), 1);
        assert!(export.comments[0].is_deleted);
        assert_eq!(export.doc.comment_spans().len(), 1);
        assert_eq!(export.version.as_deref(), Some(EXPORT_VERSION));
        assert!(export.exported_at.is_some());
    }
}

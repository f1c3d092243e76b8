use crate::doc::Document;
use crate::model::Segment;

/// Concatenates the text covered by each segment, one line per segment.
/// Disjoint segments of a split anchor read back as separate lines.
pub fn comment_text(doc: &Document, segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|seg| doc.text_in(seg.from, seg.to))
        .collect::<Vec<_>>()
        .join("\n")
}

/// True iff the document accepts edits and the selection is non-collapsed.
pub fn can_create_comment(doc: &Document, selection: Option<(usize, usize)>) -> bool {
    doc.is_editable() && matches!(selection, Some((from, to)) if from != to)
}

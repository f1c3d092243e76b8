//! # Document Model
//!
//! A minimal tree-structured text document standing in for the host editor:
//! blocks (paragraphs) of text spans, each span carrying a set of marks —
//! comment anchors and unrelated inline styles.
//!
//! This module exposes exactly the three primitives the comment engine needs
//! from a host edit pipeline:
//!
//! - an atomic multi-op edit ([`Document::apply`]): every op in an [`Edit`]
//!   is validated up front and either all ops apply or none do
//! - a full scan of spans with their marks ([`Document::comment_spans`])
//! - edit metadata flags the engine reads ([`EditMeta`]: undo/redo
//!   indicator, emphasize-id side channel)
//!
//! ## Coordinates
//!
//! Positions are global character offsets. A block boundary occupies one
//! position (it reads back as `\n` in extracted text), so a document with
//! blocks of lengths 5 and 3 has length 9 and the boundary sits at offset 5.
//! Marks live on text spans only; a mark range covering a boundary marks the
//! text on both sides but never the boundary itself.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SidenoteError};
use crate::model::{CommentId, Segment};

/// An inline mark on a span: either a comment anchor or an unrelated style
/// (bold, link, ...) that must survive anchor removal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Comment(CommentId),
    Style(String),
}

impl Mark {
    pub fn style(name: impl Into<String>) -> Self {
        Mark::Style(name.into())
    }
}

/// A run of text with a uniform mark set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub marks: BTreeSet<Mark>,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: BTreeSet::new(),
        }
    }

    pub fn marked(text: impl Into<String>, marks: impl IntoIterator<Item = Mark>) -> Self {
        Self {
            text: text.into(),
            marks: marks.into_iter().collect(),
        }
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

fn byte_index(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

/// One paragraph: a sequence of spans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub spans: Vec<Span>,
}

impl Block {
    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            Self::default()
        } else {
            Self {
                spans: vec![Span::plain(text)],
            }
        }
    }

    pub fn len(&self) -> usize {
        self.spans.iter().map(Span::char_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    // Text inserted at a span boundary joins the preceding span, so typing at
    // the end of a commented word extends the comment. At block start there is
    // no preceding span and the text arrives unmarked.
    fn insert_text(&mut self, local: usize, text: &str) {
        if local == 0 {
            self.spans.insert(0, Span::plain(text));
            return;
        }
        let mut offset = local;
        for span in self.spans.iter_mut() {
            let len = span.char_len();
            if offset <= len {
                let byte = byte_index(&span.text, offset);
                span.text.insert_str(byte, text);
                return;
            }
            offset -= len;
        }
    }

    /// Ensures a span boundary at `local` and returns the index of the span
    /// starting there.
    fn boundary(&mut self, local: usize) -> usize {
        let mut offset = local;
        for i in 0..self.spans.len() {
            if offset == 0 {
                return i;
            }
            let len = self.spans[i].char_len();
            if offset < len {
                let byte = byte_index(&self.spans[i].text, offset);
                let tail = self.spans[i].text.split_off(byte);
                let marks = self.spans[i].marks.clone();
                self.spans.insert(i + 1, Span { text: tail, marks });
                return i + 1;
            }
            offset -= len;
        }
        self.spans.len()
    }

    fn delete(&mut self, from: usize, to: usize) {
        let start = self.boundary(from);
        let end = self.boundary(to);
        self.spans.drain(start..end);
    }

    fn set_mark(&mut self, from: usize, to: usize, mark: &Mark, add: bool) {
        let start = self.boundary(from);
        let end = self.boundary(to);
        for span in &mut self.spans[start..end] {
            if add {
                span.marks.insert(mark.clone());
            } else {
                span.marks.remove(mark);
            }
        }
    }

    fn normalize(&mut self) {
        let spans = std::mem::take(&mut self.spans);
        for span in spans {
            if span.text.is_empty() {
                continue;
            }
            if let Some(last) = self.spans.last_mut() {
                if last.marks == span.marks {
                    last.text.push_str(&span.text);
                    continue;
                }
            }
            self.spans.push(span);
        }
    }
}

/// Metadata flags carried by an edit, read by the engine's post-edit step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditMeta {
    /// Set by the host on undo/redo application; bypasses the validation
    /// debounce because a single undo step can move or destroy many anchors.
    pub undo_redo: bool,
    /// Side channel: ask the tracker to emphasize this comment.
    pub emphasize: Option<CommentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    InsertText { at: usize, text: String },
    DeleteRange { from: usize, to: usize },
    AddMark { from: usize, to: usize, mark: Mark },
    RemoveMark { from: usize, to: usize, mark: Mark },
    ReplaceAll { blocks: Vec<Block> },
}

/// An atomic unit of document mutation: all ops apply or none do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edit {
    pub ops: Vec<EditOp>,
    pub meta: EditMeta,
}

impl Edit {
    pub fn new(ops: Vec<EditOp>) -> Self {
        Self {
            ops,
            meta: EditMeta::default(),
        }
    }

    pub fn single(op: EditOp) -> Self {
        Self::new(vec![op])
    }

    /// An edit with no ops. Dispatching one still runs the post-edit step,
    /// which is how imports force a fresh range derivation.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn with_undo_redo(mut self) -> Self {
        self.meta.undo_redo = true;
        self
    }

    pub fn with_emphasis(mut self, id: CommentId) -> Self {
        self.meta.emphasize = Some(id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    blocks: Vec<Block>,
    #[serde(skip)]
    read_only: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::default()],
            read_only: false,
        }
    }

    /// Builds a document from plain text, one block per line.
    pub fn from_text(text: &str) -> Self {
        Self {
            blocks: text.split('\n').map(Block::from_text).collect(),
            read_only: false,
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut doc = Self {
            blocks,
            read_only: false,
        };
        doc.normalize();
        doc
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_editable(&self) -> bool {
        !self.read_only
    }

    /// Total length in positions: span characters plus one per block boundary.
    pub fn len(&self) -> usize {
        let chars: usize = self.blocks.iter().map(Block::len).sum();
        chars + self.blocks.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Extracts the text covered by `[from, to)`; block boundaries read back
    /// as `\n`. Positions beyond the end contribute nothing.
    pub fn text_in(&self, from: usize, to: usize) -> String {
        let mut out = String::new();
        let mut pos = 0;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                if pos >= from && pos < to {
                    out.push('\n');
                }
                pos += 1;
            }
            for span in &block.spans {
                let len = span.char_len();
                let start = from.max(pos);
                let end = to.min(pos + len);
                if start < end {
                    out.extend(span.text.chars().skip(start - pos).take(end - start));
                }
                pos += len;
            }
        }
        out
    }

    /// Full scan: every (comment id, span segment) occurrence in document
    /// order. Same-id occurrences are NOT merged here; that is the range
    /// tracker's job, and the validator deliberately consumes the raw list.
    pub fn comment_spans(&self) -> Vec<(CommentId, Segment)> {
        let mut out = Vec::new();
        let mut pos = 0;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                pos += 1;
            }
            for span in &block.spans {
                let len = span.char_len();
                if len == 0 {
                    continue;
                }
                for mark in &span.marks {
                    if let Mark::Comment(id) = mark {
                        out.push((*id, Segment::new(pos, pos + len)));
                    }
                }
                pos += len;
            }
        }
        out
    }

    /// Applies an edit atomically. Every op is validated against the
    /// document state it will see before any span is touched; a read-only
    /// document rejects all edits, including no-ops.
    pub fn apply(&mut self, edit: &Edit) -> Result<()> {
        if self.read_only {
            return Err(SidenoteError::ReadOnlyDocument);
        }
        self.validate(edit)?;
        for op in &edit.ops {
            self.apply_op(op);
            self.normalize();
        }
        log::trace!("applied edit with {} op(s)", edit.ops.len());
        Ok(())
    }

    fn validate(&self, edit: &Edit) -> Result<()> {
        let mut len = self.len();
        for op in &edit.ops {
            match op {
                EditOp::InsertText { at, text } => {
                    if *at > len {
                        return Err(SidenoteError::InvalidRange {
                            from: *at,
                            to: *at,
                            len,
                        });
                    }
                    len += text.chars().count();
                }
                EditOp::DeleteRange { from, to } => {
                    if from > to || *to > len {
                        return Err(SidenoteError::InvalidRange {
                            from: *from,
                            to: *to,
                            len,
                        });
                    }
                    len -= to - from;
                }
                EditOp::AddMark { from, to, .. } | EditOp::RemoveMark { from, to, .. } => {
                    if from > to || *to > len {
                        return Err(SidenoteError::InvalidRange {
                            from: *from,
                            to: *to,
                            len,
                        });
                    }
                }
                EditOp::ReplaceAll { blocks } => {
                    let chars: usize = blocks.iter().map(Block::len).sum();
                    len = chars + blocks.len().saturating_sub(1);
                }
            }
        }
        Ok(())
    }

    fn apply_op(&mut self, op: &EditOp) {
        match op {
            EditOp::InsertText { at, text } => self.insert_text(*at, text),
            EditOp::DeleteRange { from, to } => self.delete_range(*from, *to),
            EditOp::AddMark { from, to, mark } => self.mark_range(*from, *to, mark, true),
            EditOp::RemoveMark { from, to, mark } => self.mark_range(*from, *to, mark, false),
            EditOp::ReplaceAll { blocks } => self.blocks = blocks.clone(),
        }
    }

    /// Resolves a global position to (block index, block-local offset). A
    /// boundary position resolves to the end of the block before it.
    fn locate(&self, pos: usize) -> (usize, usize) {
        let mut p = pos;
        for (i, block) in self.blocks.iter().enumerate() {
            let len = block.len();
            if p <= len {
                return (i, p);
            }
            p -= len + 1;
        }
        let last = self.blocks.len() - 1;
        (last, self.blocks[last].len())
    }

    fn insert_text(&mut self, at: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let (bi, local) = self.locate(at);
        if !text.contains('\n') {
            self.blocks[bi].insert_text(local, text);
            return;
        }
        // Multi-line insert splits the block at the insertion point.
        let split = self.blocks[bi].boundary(local);
        let tail: Vec<Span> = self.blocks[bi].spans.split_off(split);
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            if !first.is_empty() {
                self.blocks[bi].spans.push(Span::plain(first));
            }
        }
        let mut middle: Vec<&str> = parts.collect();
        let last = middle.pop().unwrap_or_default();
        let mut insert_at = bi + 1;
        for part in middle {
            self.blocks.insert(insert_at, Block::from_text(part));
            insert_at += 1;
        }
        let mut tail_block = Block::from_text(last);
        tail_block.spans.extend(tail);
        self.blocks.insert(insert_at, tail_block);
    }

    fn delete_range(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let (b1, l1) = self.locate(from);
        let (b2, l2) = self.locate(to);
        if b1 == b2 {
            self.blocks[b1].delete(l1, l2);
            return;
        }
        // Deleting across a boundary merges the surviving halves.
        let end = self.blocks[b1].len();
        self.blocks[b1].delete(l1, end);
        self.blocks[b2].delete(0, l2);
        let tail: Vec<Span> = self.blocks[b2].spans.drain(..).collect();
        self.blocks[b1].spans.extend(tail);
        self.blocks.drain(b1 + 1..=b2);
    }

    fn mark_range(&mut self, from: usize, to: usize, mark: &Mark, add: bool) {
        let (b1, l1) = self.locate(from);
        let (b2, l2) = self.locate(to);
        if b1 == b2 {
            self.blocks[b1].set_mark(l1, l2, mark, add);
            return;
        }
        let end = self.blocks[b1].len();
        self.blocks[b1].set_mark(l1, end, mark, add);
        for bi in b1 + 1..b2 {
            let end = self.blocks[bi].len();
            self.blocks[bi].set_mark(0, end, mark, add);
        }
        self.blocks[b2].set_mark(0, l2, mark, add);
    }

    fn normalize(&mut self) {
        for block in &mut self.blocks {
            block.normalize();
        }
        if self.blocks.is_empty() {
            self.blocks.push(Block::default());
        }
    }
}

//! # Sidenote Architecture
//!
//! Sidenote is a **UI-agnostic commenting library**: it anchors comment
//! threads to spans of a live, editable document and keeps every comment's
//! spatial position valid as the document changes — detecting when an
//! anchor is destroyed, split into disjoint pieces, or left without a
//! backing record.
//!
//! The hard problem is that a comment lives in two places at once: as an
//! inline mark on document spans, and as an entity in an out-of-band store
//! holding content, author, and status. Both mutate independently, and they
//! must never silently diverge.
//!
//! ## The Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Facade (api.rs)                                        │
//! │  - Single entry point: SidenoteApi                          │
//! │  - The edit pipeline: every mutation funnels through one    │
//! │    post-edit step (rescan ranges, schedule validation)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Pure business logic per operation                        │
//! │  - Graceful negative results for precondition failures      │
//! └─────────────────────────────────────────────────────────────┘
//!                  │                        │
//!                  ▼                        ▼
//! ┌───────────────────────────┐ ┌───────────────────────────────┐
//! │  Document (doc.rs)        │ │  Entity Store (store.rs)      │
//! │  - blocks / spans / marks │ │  - CRUD + tombstones          │
//! │  - atomic edits, scans    │ │  - listeners, query cache     │
//! └───────────────────────────┘ └───────────────────────────────┘
//!                  │                        │
//!                  └──────────┬─────────────┘
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Derivation & Reconciliation (tracker.rs, sync.rs)          │
//! │  - ranges re-derived after every edit (never authored)      │
//! │  - validator reports drift, repairs only when asked         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principles
//!
//! - **Anchor ranges are derived state.** The tracker recomputes them from
//!   the document after each edit as a pure function of the current span
//!   marks; nothing ever writes a range directly.
//! - **Reconciliation is explicit.** The validator reports deleted, split,
//!   and orphaned anchors as a diagnostic value. It never auto-repairs —
//!   a silent fix could destroy user intent — so repair is a separate,
//!   caller-invoked action.
//! - **Single-threaded by design.** One serialized mutation pipeline, no
//!   locks; "concurrency" here is the cooperative scheduling of debounced
//!   validation, driven from the host's idle loop.
//! - **No I/O assumptions.** The library logs through the `log` facade,
//!   returns structured results, and leaves persistence of the JSON
//!   interchange format to the caller.
//!
//! ## Module Overview
//!
//! - [`api`]: The facade — entry point for all operations
//! - [`commands`]: Business logic for each operation
//! - [`doc`]: The document tree: blocks, spans, marks, atomic edits
//! - [`store`]: The comment entity store
//! - [`tracker`]: Live range derivation and the range signature
//! - [`sync`]: Drift detection, orphan cleanup, debounced scheduling
//! - [`model`]: Core data types (`Comment`, `AnchorRange`, `Segment`)
//! - [`error`]: Error types

pub mod api;
pub mod commands;
pub mod doc;
pub mod error;
pub mod model;
pub mod store;
pub mod sync;
pub mod tracker;

pub use api::{ImportOptions, SidenoteApi};
pub use error::{Result, SidenoteError};
pub use model::{AnchorRange, Author, Comment, CommentId, CommentStatus, Segment};

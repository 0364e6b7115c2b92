//! LinkCleaner Core Library
//!
//! This crate provides the rewrite engine for the LinkCleaner content script.
//! It finds hyperlink-bearing elements whose address wraps another URL
//! (redirect endpoints, link filters, image proxies) and rewrites the address
//! in place to the destination it encodes.
//!
//! # Architecture
//!
//! The host document is reached only through the [`DocumentTree`] trait, so the
//! same engine runs against the live browser DOM (see `lc-wasm`) and against the
//! in-memory [`Tree`] used by tests and the CLI.
//!
//! # Modules
//!
//! - `table`: target patterns and the built-in target table
//! - `extract`: delimiter occurrence search and payload slicing
//! - `decode`: strict percent decoding
//! - `dom`: element kinds, the document seam, mutation records, in-memory tree
//! - `classify`: rewrite candidate filter
//! - `rewrite`: the fixed-point rewrite dispatcher
//! - `observer`: initial sweep and mutation batch processing

pub mod classify;
pub mod decode;
pub mod dom;
pub mod extract;
pub mod observer;
pub mod rewrite;
pub mod table;

// Re-export commonly used types
pub use classify::is_rewrite_candidate;
pub use decode::{decode_uri_component, DecodeError};
pub use dom::{DocumentTree, ElementKind, MutationRecord, NodeId, ObserveOptions, Tree};
pub use extract::{find_all_occurrences, slice_payload, MatchOffset, Occurrences, Slice};
pub use observer::{LinkCleaner, Stats};
pub use rewrite::{Cleaned, Rewrite, RewriteError, Rewriter, MAX_REWRITE_DEPTH};
pub use table::{DomainScope, TableError, TargetPattern, TargetSpec, TargetTable};

/// Attribute holding the address on every element kind the engine rewrites.
pub const ADDRESS_ATTRIBUTE: &str = "href";

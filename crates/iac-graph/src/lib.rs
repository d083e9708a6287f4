//! # iac-graph
//!
//! Resource graph model for infrastructure-as-code policy evaluation.
//!
//! A [`SourceParser`] turns a source directory into a [`RawGraph`]. The
//! [`ResourceGraph`] wraps that tree and exposes a lazy, restartable stream
//! of `(type_name, resources)` pairs. [`IndexedGraph::build`] drains the
//! stream exactly once to populate the [`ReferenceIndex`], so anything that
//! holds an `IndexedGraph` can rely on a complete index.
//!
//! ## Key invariants
//!
//! - **Symmetric index**: every edge A→B recorded under B's type has a
//!   matching inverse B→A under A's type.
//! - **Fresh wrapping**: every stream query wraps raw items into new
//!   [`Resource`] values, so filter annotations never leak between runs.
//! - **Misses are empty**: looking up an unknown id or type yields an empty
//!   slice, never a panic.

pub mod error;
pub mod graph;
pub mod index;
pub mod parser;
pub mod raw;
pub mod resource;
pub mod value;

pub use error::GraphError;
pub use graph::{IndexedGraph, ResourceGraph, ResourceGroup, TypeStream};
pub use index::ReferenceIndex;
pub use parser::{SourceParser, TfJsonParser};
pub use raw::{RawGraph, RawResource, RawTypeEntry};
pub use resource::{Resource, ResourceMeta};
pub use value::{lookup_path, AttributeValue, Reference};

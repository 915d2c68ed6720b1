//! Kiln Asset - Live objects and where they come from
//!
//! This crate provides the runtime side of an import: the [`Object`] model,
//! the [`ContentStore`] arena that owns every materialized object, the
//! [`NodeGraph`] arena used by graph-shaped assets, and the two sources an
//! unresolved reference can be fetched from (local export files and a
//! remote export service).

mod cache;
mod fetch;
mod graph;
mod object;
mod source;
mod store;

pub use cache::FetchCache;
pub use fetch::{FetchResponse, HttpFetcher, MockFetcher, RemoteFetcher, RequestLog};
pub use graph::{Edge, GraphNode, GraphScope, NodeGraph};
pub use object::Object;
pub use source::{read_export_file, LocalExportSource};
pub use store::ContentStore;

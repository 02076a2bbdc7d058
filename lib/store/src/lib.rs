//! Access to the remote graph store through the SPARQL 1.1 protocol.
//!
//! The gateway never evaluates SPARQL itself. Every load, query and drop goes through a
//! [`GraphStore`]. Temporary graphs are allocated and released through a [`GraphScope`].

mod client;
mod error;
mod lifecycle;
#[cfg(feature = "memory")]
mod memory;
pub mod results;

pub use client::{GraphStore, HttpGraphStore, StoreResponse};
pub use error::StoreError;
pub use lifecycle::{GraphScope, TEMP_GRAPH_PREFIX};
#[cfg(feature = "memory")]
pub use memory::MemoryGraphStore;

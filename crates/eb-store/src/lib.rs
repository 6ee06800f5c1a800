//! Storage ports for Everbranch.
//!
//! Two stores back the engine: the truth store (branching, append-only
//! events, versioned entities) and the graph store (relationships, variant
//! tracking, vector retrieval). The LLM sits behind a third port. All three
//! are traits so the core stays testable with the in-memory implementations
//! in [`memory`].

pub mod error;
pub mod memory;
pub mod ports;
pub mod staged;

pub use error::{LlmError, StoreError, StoreResult};
pub use memory::{CannedLlm, MemoryGraphRepo, MemoryTruthRepo, OfflineLlm};
pub use ports::{GraphNode, GraphRepo, LlmPort, Transaction, TruthRepo};
pub use staged::StagedTruth;

//! Entity/component store
//!
//! Sparse, type-indexed component arrays addressed by integer entity ids,
//! with FIFO id recycling and a reverse index for O(1) teardown.

pub mod entity;
pub mod registry;
pub mod sparse_array;

pub use entity::Entity;
pub use registry::{Registry, RegistryError};
pub use sparse_array::SparseArray;

//! Hierarchical InSAR product writing

pub mod container;
pub mod grids;
pub mod procinfo;
pub mod schema;
pub mod store;
pub mod writer;

// Re-export main types
pub use container::{AttrValue, Attributes, Dataset, DatasetValues, Dtype, Group, ProductContainer};
pub use schema::{AlgorithmSet, DatasetSpec, GridBase, GroupPaths, LayerContent, ProductInfo, ProductProfile};
pub use writer::{ProductWriter, WriterState};

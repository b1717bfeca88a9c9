//! Mesh partitioning by face layer
//!
//! Converts face-level properties into mesh-level ones by splitting a mesh
//! into one sub-mesh per distinct layer signature, and builds collision and
//! physics proxies for legacy instanced geometry.

pub mod normals;
pub mod overrides;
pub mod splitter;

pub use normals::{NormalBinding, NormalSource};
pub use overrides::{normalize_global_material, OverrideContext, PartProps};
pub use splitter::{is_split_justified, signature_groups, Part, PartRole, Partition, Partitioner, SignatureGroup};

//! Build manifest written next to the source asset
//!
//! The manifest tells the tag compiler which compiled containers make up
//! each output tag. Every job in the plan appears as exactly one content
//! network.

mod builder;
pub mod xml;

pub use builder::{animation_network, manifest_path, windows_path, BuildManifest, ManifestBuilder, OBJECT_TAGS};
pub use xml::XmlElement;

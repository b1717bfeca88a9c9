//! Scene normalization
//!
//! This module provides:
//! - Classification of authored kinds into export kinds
//! - Name cleanup and skeleton resolution
//! - Seam pairing for multi-BSP scenarios
//! - Bucketing of export objects into job families

pub mod buckets;
pub mod classify;
pub mod naming;
mod normalizer;
pub mod seams;
pub mod skeleton;

pub use buckets::{assign_bucket, Bucket};
pub use classify::{classify, is_valid, Classified};
pub use normalizer::{BucketedObject, NormalizedScene, Normalizer, INVALID_MATERIAL, NULL_RENDER};
pub use skeleton::Skeleton;

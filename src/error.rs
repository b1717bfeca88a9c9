//! Error handling for Tagforge
//!
//! Fatal errors abort an export; scene-integrity problems are reported as
//! [`SceneWarning`]s instead and never stop the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Tagforge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Main error type for Tagforge operations
#[derive(Error, Debug)]
pub enum ForgeError {
    // Scene Errors
    #[error("Failed to load scene: {path}")]
    SceneLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load export settings: {path}")]
    SettingsLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scene: {reason}")]
    InvalidScene { reason: String },

    #[error("No exportable objects in scene")]
    NoExportObjects,

    #[error("Armature '{armature}' has {count} root bones, expected exactly one")]
    MultipleRootBones { armature: String, count: usize },

    // Job Errors
    #[error("Two export jobs resolve to the same output path: {path}")]
    DuplicateJobPath { path: PathBuf },

    #[error("Failed to write interchange file: {path}")]
    InterchangeWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GR2 conversion failed: {path} (after {attempts} attempts)")]
    ConversionFailed { path: PathBuf, attempts: u32 },

    #[error("Compiled container is corrupt: {path} ({reason})")]
    CorruptContainer { path: PathBuf, reason: String },

    // External Tool Errors
    #[error("Failed to launch {tool}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Sidecar is read only, cannot complete export: {path}")]
    ManifestReadOnly { path: PathBuf },

    #[error("Tag import aborted: {line}")]
    ImportAborted { line: String },

    #[error("Tag API request failed: {reason}")]
    TagApi { reason: String },

    #[error("Lightmapper failed during {stage}. See error log for details: {log}")]
    LightmapFailed { stage: String, log: PathBuf },

    // Control Flow
    #[error("Export cancelled by user")]
    Cancelled,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl ForgeError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ForgeError::SceneLoad { .. } => "SCENE_LOAD",
            ForgeError::SettingsLoad { .. } => "SETTINGS_LOAD",
            ForgeError::InvalidScene { .. } => "INVALID_SCENE",
            ForgeError::NoExportObjects => "NO_EXPORT_OBJECTS",
            ForgeError::MultipleRootBones { .. } => "MULTIPLE_ROOT_BONES",
            ForgeError::DuplicateJobPath { .. } => "DUPLICATE_JOB_PATH",
            ForgeError::InterchangeWrite { .. } => "INTERCHANGE_WRITE",
            ForgeError::ConversionFailed { .. } => "CONVERSION_FAILED",
            ForgeError::CorruptContainer { .. } => "CORRUPT_CONTAINER",
            ForgeError::ToolLaunch { .. } => "TOOL_LAUNCH",
            ForgeError::ManifestReadOnly { .. } => "MANIFEST_READ_ONLY",
            ForgeError::ImportAborted { .. } => "IMPORT_ABORTED",
            ForgeError::TagApi { .. } => "TAG_API",
            ForgeError::LightmapFailed { .. } => "LIGHTMAP_FAILED",
            ForgeError::Cancelled => "CANCELLED",
            ForgeError::Io(_) => "IO_ERROR",
            ForgeError::Serialization(_) => "SERIALIZATION_ERROR",
            ForgeError::Encoding(_) => "ENCODING_ERROR",
        }
    }

    /// Check if re-running the export could succeed without changing the scene
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ForgeError::ConversionFailed { .. }
                | ForgeError::CorruptContainer { .. }
                | ForgeError::ImportAborted { .. }
                | ForgeError::ManifestReadOnly { .. }
                | ForgeError::Cancelled
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ForgeError::SceneLoad { .. } => vec![
                "Check the scene path is correct",
                "Re-export the scene snapshot from the editor",
            ],
            ForgeError::NoExportObjects => vec![
                "Ensure at least one object is valid and has the export flag enabled",
                "Check that objects are not hidden by collection visibility",
            ],
            ForgeError::MultipleRootBones { .. } => vec![
                "Parent every deform bone under a single root bone",
            ],
            ForgeError::DuplicateJobPath { .. } => vec![
                "Rename the BSP or permutation so output names no longer collide",
            ],
            ForgeError::ConversionFailed { .. } => vec![
                "GR2 conversion can crash when the converter fails to parse the interchange data",
                "Narrow down the problem object and adjust its geometry",
                "Splitting meshes into separate parts can help",
            ],
            ForgeError::CorruptContainer { .. } | ForgeError::ImportAborted { .. } => vec![
                "Re-run the export to rebuild the compiled containers",
            ],
            ForgeError::ToolLaunch { .. } => vec![
                "Check the tool path in the export settings or TAGFORGE_TOOL",
                "Verify the editing kit is installed",
            ],
            ForgeError::ManifestReadOnly { .. } => vec![
                "Check the sidecar out of source control or clear its read-only flag",
            ],
            ForgeError::LightmapFailed { .. } => vec![
                "Inspect the stage log named in the error",
                "If the log is empty, check for free disk space",
            ],
            _ => vec![],
        }
    }
}

/// Recoverable scene-integrity problems found while preparing an export.
///
/// Each warning has already been auto-fixed (or the offending object dropped)
/// by the time it is reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneWarning {
    #[error("{mesh}: face layer '{layer}' references {count} missing faces, ignored for this layer")]
    DanglingFaceIndices {
        mesh: String,
        layer: String,
        count: usize,
    },

    #[error("{object} has invalid type [{kind}] for asset [{category}]. Skipped")]
    InvalidType {
        object: String,
        kind: String,
        category: String,
    },

    #[error("{object} has no faces. Skipped")]
    EmptyMesh { object: String },

    #[error("Object [{object}] has {table} [{name}] which is not present in the {table}s table. Setting {table} to: default")]
    UnknownTableEntry {
        object: String,
        table: &'static str,
        name: String,
    },

    #[error("{seam} has bad back facing bsp reference. Replaced with nearest adjacent bsp [{bsp}]")]
    SeamBackReplaced { seam: String, bsp: String },

    #[error("Failed to automatically set back facing bsp reference for {seam}. Removing seam from export")]
    SeamRemoved { seam: String },

    #[error("{object} has an empty material slot, using placeholder {placeholder}")]
    MissingMaterial {
        object: String,
        placeholder: &'static str,
    },

    #[error("{object} has no UV channel, a blank one was added")]
    MissingUvs { object: String },

    #[error("{object} has decorator LOD {lod}, using {clamped}")]
    DecoratorLodOutOfRange { object: String, lod: u8, clamped: u8 },
}

use thiserror::Error;

/// Preview length for id lists carried in errors
pub const ID_PREVIEW_LIMIT: usize = 10;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Archive could not be read: {0}")]
    ArchiveUnreadable(String),

    #[error("No images found at the top level of the archive")]
    NoImagesFound,

    #[error("Record not found in store: {0}")]
    RecordNotFound(String),

    #[error("Cursor out of bounds: position {position}, {len} images")]
    OutOfBounds { position: usize, len: usize },

    #[error("Import rejected: {total} unknown external id(s): {}", .unknown.join(", "))]
    ImportValidationFailed { unknown: Vec<String>, total: usize },

    #[error("Import rejected: line {line}: {reason}")]
    InvalidImportRow { line: usize, reason: String },

    #[error("Export failed: {0}")]
    ClipboardOrExportFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("An ingestion is already in progress")]
    IngestionInProgress,

    #[error("Store is locked by another process: {0}")]
    StoreLocked(String),

    #[error("Store schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("Migration {from} -> {to} failed: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] star_classifier_common::Error),
}

impl ClassifierError {
    /// Build an import rejection, keeping only a short preview of the ids
    pub fn unknown_ids(mut ids: Vec<String>) -> Self {
        let total = ids.len();
        ids.truncate(ID_PREVIEW_LIMIT);
        ClassifierError::ImportValidationFailed {
            unknown: ids,
            total,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClassifierError>;

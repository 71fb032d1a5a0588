use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `appState` key holding [`Pagination`]
pub const PAGINATION_KEY: &str = "pagination";
/// `appState` key holding [`IngestionInfo`]
pub const INGESTION_KEY: &str = "ingestion";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub rows_per_page: usize,
}

/// Bookkeeping for the last archive upload.
///
/// Written before the first record lands and completed after the last one;
/// `completed_at == None` on load means the ingestion was interrupted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionInfo {
    pub archive_name: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_count: usize,
}

impl IngestionInfo {
    pub fn started(archive_name: impl Into<String>) -> Self {
        Self {
            archive_name: archive_name.into(),
            started_at: Utc::now(),
            completed_at: None,
            image_count: 0,
        }
    }

    pub fn complete(mut self, image_count: usize) -> Self {
        self.completed_at = Some(Utc::now());
        self.image_count = image_count;
        self
    }

    pub fn is_interrupted(&self) -> bool {
        self.completed_at.is_none()
    }
}

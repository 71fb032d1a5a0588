//! Schema migrations
//!
//! Each step is a pure function from a read-only view of the old store to a
//! [`Transaction`]; the store commits the writes together with the version
//! bump. Steps only add data. The collections they read from are left as they
//! were so a bad step can be rolled back by hand.

use super::{Collection, Pagination, StoreView, Transaction, PAGINATION_KEY};
use crate::error::{ClassifierError, Result};
use crate::ingest::basename;
use base64::Engine;
use serde::{Deserialize, Serialize};
use star_classifier_common::{ItemRecord, Label};
use std::collections::HashMap;
use tracing::warn;

pub type MigrationFn = fn(&StoreView<'_>) -> Result<Transaction>;

pub struct Migration {
    pub from: u32,
    pub to: u32,
    pub name: &'static str,
    pub apply: MigrationFn,
}

/// Registered steps, in order
pub const MIGRATIONS: &[Migration] = &[Migration {
    from: 1,
    to: 2,
    name: "split legacy state into images and stars",
    apply: split_legacy_state,
}];

/// Key of the single v1 document in [`Collection::State`]
pub const LEGACY_STATE_KEY: &str = "appState";

/// v1 snapshot of the whole session, stored as one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyState {
    pub image_files: Vec<LegacyImageFile>,
    pub current_index: usize,
    pub results: Vec<LegacyResult>,
    pub rows_per_page: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyImageFile {
    /// Archive entry path
    pub name: String,
    /// Base64 image bytes
    pub blob: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyResult {
    #[serde(default)]
    pub star_id: String,
    pub filename: String,
    pub classification: String,
}

/// v1 -> v2: one image blob and one record per legacy image file
///
/// The label comes from the matching legacy result, if any; `rowsPerPage`
/// moves to `appState.pagination`.
pub fn split_legacy_state(view: &StoreView<'_>) -> Result<Transaction> {
    let mut tx = Transaction::new();
    let Some(legacy) = view.get::<LegacyState>(Collection::State, LEGACY_STATE_KEY)? else {
        return Ok(tx);
    };

    let labels: HashMap<&str, &str> = legacy
        .results
        .iter()
        .map(|r| (r.filename.as_str(), r.classification.as_str()))
        .collect();

    let engine = base64::engine::general_purpose::STANDARD;
    for file in &legacy.image_files {
        let bytes = engine.decode(file.blob.as_bytes()).map_err(|e| {
            ClassifierError::Store(format!("legacy image {} is not base64: {}", file.name, e))
        })?;

        let label = match labels.get(file.name.as_str()) {
            Some(text) => match text.parse::<Label>() {
                Ok(label) => Some(label),
                Err(_) => {
                    warn!(file = %file.name, classification = %text, "unknown legacy label, leaving unlabeled");
                    None
                }
            },
            None => None,
        };

        let file_name = basename(&file.name);
        tx.put_image(file_name, bytes);
        tx.put(
            Collection::Stars,
            file_name,
            &ItemRecord::new(file_name).with_label(label),
        )?;
    }

    if let Some(rows_per_page) = legacy.rows_per_page.filter(|n| *n > 0) {
        tx.put(
            Collection::AppState,
            PAGINATION_KEY,
            &Pagination { rows_per_page },
        )?;
    }

    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Snapshot, StoreView};
    use serde_json::json;

    fn view_with_state(state: serde_json::Value) -> Snapshot {
        let mut snapshot = Snapshot {
            version: 1,
            ..Default::default()
        };
        snapshot
            .collections
            .entry(Collection::State)
            .or_default()
            .insert(LEGACY_STATE_KEY.to_string(), state);
        snapshot
    }

    #[test]
    fn test_split_legacy_state_without_legacy_document() {
        let snapshot = Snapshot::default();
        let tx = split_legacy_state(&StoreView { snapshot: &snapshot }).unwrap();
        assert!(tx.is_empty());
    }

    #[test]
    fn test_split_legacy_state_writes() {
        let snapshot = view_with_state(json!({
            "imageFiles": [
                {"name": "set/TIC_100_x.png", "blob": "AQID"},
                {"name": "set/TIC_200_y.png", "blob": "BAUG"}
            ],
            "currentIndex": 1,
            "results": [
                {"starId": "100", "filename": "set/TIC_100_x.png", "classification": "Так"}
            ],
            "rowsPerPage": 20
        }));

        let tx = split_legacy_state(&StoreView { snapshot: &snapshot }).unwrap();
        // 2 images + 2 records + pagination
        assert_eq!(tx.len(), 5);
    }

    #[test]
    fn test_split_legacy_state_rejects_bad_base64() {
        let snapshot = view_with_state(json!({
            "imageFiles": [{"name": "a.png", "blob": "***"}],
            "results": []
        }));
        let result = split_legacy_state(&StoreView { snapshot: &snapshot });
        assert!(matches!(result, Err(ClassifierError::Store(_))));
    }
}

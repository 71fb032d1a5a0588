//! Classification cursor
//!
//! Walks the records that were unlabeled when the cursor was last rebuilt.
//! The sequence does not shrink as labels are written; only a rebuild drops
//! labeled records from it.

use crate::error::{ClassifierError, Result};
use crate::store::{Collection, Store};
use star_classifier_common::{ItemRecord, Label};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationCursor {
    unlabeled: Vec<String>,
    position: usize,
    classified_count: usize,
    total_count: usize,
}

impl ClassificationCursor {
    /// Recompute from the store. Position always restarts at 0.
    pub fn rebuild(store: &Store) -> Result<Self> {
        let records: Vec<ItemRecord> = store.get_all(Collection::Stars)?;
        let total_count = records.len();
        let unlabeled: Vec<String> = records
            .iter()
            .filter(|r| !r.is_labeled())
            .map(|r| r.file_name.clone())
            .collect();
        let classified_count = total_count - unlabeled.len();

        debug!(total_count, unlabeled = unlabeled.len(), "cursor rebuilt");
        Ok(Self {
            unlabeled,
            position: 0,
            classified_count,
            total_count,
        })
    }

    /// File name under the cursor, `None` once every item was visited
    pub fn current(&self) -> Option<&str> {
        self.unlabeled.get(self.position).map(String::as_str)
    }

    pub fn is_terminal(&self) -> bool {
        self.position >= self.unlabeled.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.unlabeled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unlabeled.is_empty()
    }

    pub fn classified_count(&self) -> usize {
        self.classified_count
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn unlabeled(&self) -> &[String] {
        &self.unlabeled
    }

    /// Label the current record and step forward
    pub async fn advance(&mut self, store: &mut Store, label: Label) -> Result<()> {
        let file_name = self
            .current()
            .ok_or(ClassifierError::OutOfBounds {
                position: self.position,
                len: self.unlabeled.len(),
            })?
            .to_string();

        let record = load_record(store, &file_name)?;
        let was_labeled = record.is_labeled();
        store
            .put(Collection::Stars, &file_name, &record.with_label(Some(label)))
            .await?;

        if !was_labeled {
            self.classified_count += 1;
        }
        self.position += 1;
        debug!(file = %file_name, %label, position = self.position, "advanced");
        Ok(())
    }

    /// Step back and clear the label of the record stepped onto. No-op at 0.
    pub async fn retreat(&mut self, store: &mut Store) -> Result<()> {
        if self.position == 0 {
            return Ok(());
        }
        let target = self.position - 1;
        let file_name = self
            .unlabeled
            .get(target)
            .ok_or(ClassifierError::OutOfBounds {
                position: target,
                len: self.unlabeled.len(),
            })?
            .clone();

        let record = load_record(store, &file_name)?;
        let was_labeled = record.is_labeled();
        store
            .put(Collection::Stars, &file_name, &record.with_label(None))
            .await?;

        if was_labeled {
            self.classified_count = self.classified_count.saturating_sub(1);
        }
        self.position = target;
        debug!(file = %file_name, position = self.position, "retreated");
        Ok(())
    }
}

fn load_record(store: &Store, file_name: &str) -> Result<ItemRecord> {
    store
        .get::<ItemRecord>(Collection::Stars, file_name)?
        .ok_or_else(|| ClassifierError::RecordNotFound(file_name.to_string()))
}

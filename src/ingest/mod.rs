//! Archive ingestion
//!
//! Keeps the image entries at the shallowest folder level of the archive and
//! loads them into the store as unlabeled records. Deeper entries (nested
//! copies, thumbnails) are dropped without error.

mod archive;

pub use archive::{ArchiveEntry, ArchiveSource, ZipSource};

#[cfg(test)]
pub(crate) use archive::test_support;

use crate::error::Result;
use crate::store::{Collection, IngestionInfo, Store, Transaction, INGESTION_KEY};
use star_classifier_common::ItemRecord;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Receives coarse progress while images are extracted
pub trait ProgressSink {
    fn start(&mut self, _total: usize) {}
    fn advance(&mut self, processed: usize, total: usize);
    fn finish(&mut self, _stored: usize) {}
}

/// Sink that ignores progress
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&mut self, _processed: usize, _total: usize) {}
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub archive_name: String,
    /// Lowercase suffix including the dot, e.g. `.png`
    pub extension_suffix: String,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Image entries found at any depth
    pub matched: usize,
    /// Entries at the shallowest depth
    pub kept: usize,
    /// Distinct records written
    pub stored: usize,
    pub depth: Option<usize>,
    /// Basenames that appeared more than once at the kept depth
    pub duplicates: Vec<String>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.stored == 0
    }
}

/// Last path component of an archive entry name
pub fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Image entries at the minimum depth, in archive order
pub fn select_entries<'a>(entries: &'a [ArchiveEntry], extension_suffix: &str) -> Vec<&'a ArchiveEntry> {
    let suffix = extension_suffix.to_lowercase();
    let images: Vec<&ArchiveEntry> = entries
        .iter()
        .filter(|e| !e.is_dir && e.name.to_lowercase().ends_with(&suffix))
        .collect();

    let Some(min_depth) = images.iter().map(|e| e.depth()).min() else {
        return Vec::new();
    };

    images.into_iter().filter(|e| e.depth() == min_depth).collect()
}

/// Empty the three session collections in one commit
pub async fn clear_session_data(store: &mut Store) -> Result<()> {
    let mut tx = Transaction::new();
    tx.clear(Collection::Images);
    tx.clear(Collection::Stars);
    tx.clear(Collection::AppState);
    store.commit(tx).await
}

/// Load the selected entries into the store
///
/// Each batch commits its blobs and records together; an interruption leaves
/// the earlier batches in place and the ingestion marker incomplete.
pub async fn ingest_archive<A: ArchiveSource>(
    store: &mut Store,
    archive: &mut A,
    options: &IngestOptions,
    sink: &mut dyn ProgressSink,
) -> Result<IngestReport> {
    let all_entries = archive.entries().to_vec();
    let suffix = options.extension_suffix.to_lowercase();
    let matched = all_entries
        .iter()
        .filter(|e| !e.is_dir && e.name.to_lowercase().ends_with(&suffix))
        .count();
    let selected: Vec<ArchiveEntry> = select_entries(&all_entries, &options.extension_suffix)
        .into_iter()
        .cloned()
        .collect();

    let mut report = IngestReport {
        matched,
        kept: selected.len(),
        depth: selected.first().map(|e| e.depth()),
        ..Default::default()
    };

    if selected.is_empty() {
        info!(archive = %options.archive_name, entries = all_entries.len(), "no images found");
        return Ok(report);
    }

    info!(
        archive = %options.archive_name,
        matched,
        kept = selected.len(),
        depth = report.depth.unwrap_or_default(),
        "ingesting archive"
    );

    let marker = IngestionInfo::started(&options.archive_name);
    store.put(Collection::AppState, INGESTION_KEY, &marker).await?;

    let total = selected.len();
    let mut seen = HashSet::new();
    let mut processed = 0usize;
    sink.start(total);

    for batch in selected.chunks(options.batch_size.max(1)) {
        let mut tx = Transaction::new();
        for entry in batch {
            let bytes = archive.read_entry(entry)?;
            let file_name = basename(&entry.name);

            if !seen.insert(file_name.to_string()) {
                warn!(entry = %entry.name, "duplicate file name, later entry wins");
                report.duplicates.push(file_name.to_string());
            }

            tx.put_image(file_name, bytes);
            tx.put(Collection::Stars, file_name, &ItemRecord::new(file_name))?;

            processed += 1;
            sink.advance(processed, total);
        }
        store.commit(tx).await?;
        debug!(processed, total, "ingestion batch committed");
    }

    report.stored = seen.len();
    store
        .put(
            Collection::AppState,
            INGESTION_KEY,
            &marker.complete(report.stored),
        )
        .await?;
    sink.finish(report.stored);

    info!(stored = report.stored, "ingestion complete");
    Ok(report)
}

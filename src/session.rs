//! Session state and the command interface front ends call
//!
//! `Session` owns the store, the classification cursor and the transient view
//! state (filter, page, page size). Every mutation goes through one of the
//! `on_*`/command methods below.
//!
//! ## Change history
//! - 2026-10-19: clear before opening the archive; busy flag moved into a drop guard

use crate::config::Config;
use crate::cursor::ClassificationCursor;
use crate::error::{ClassifierError, Result};
use crate::ingest::{
    clear_session_data, ingest_archive, select_entries, ArchiveSource, IngestOptions,
    IngestReport, ProgressSink, ZipSource,
};
use crate::preview::ImagePreview;
use crate::results::{self, ResultsPage};
use crate::store::{Collection, IngestionInfo, Store, INGESTION_KEY};
use crate::transfer::{self, ExportScope, ImportSummary};
use star_classifier_common::{ExportRow, ImportRow, ItemRecord, Label, LabelFilter};
use std::path::Path;
use tracing::{info, warn};

/// Which screen a front end should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Nothing ingested yet
    Upload,
    Classifying,
    /// Every unlabeled image was visited
    Results,
}

pub struct Session {
    store: Store,
    config: Config,
    cursor: ClassificationCursor,
    filter: LabelFilter,
    page: usize,
    rows_per_page: usize,
    ingesting: bool,
}

impl Session {
    /// Open the store named by `config`
    pub async fn open(config: Config) -> Result<Self> {
        let dir = config.store_dir()?;
        Self::open_at(&dir, config).await
    }

    pub async fn open_at(dir: &Path, config: Config) -> Result<Self> {
        config.validate()?;
        let store = Store::open(dir).await?;

        if let Some(info) = store.get::<IngestionInfo>(Collection::AppState, INGESTION_KEY)? {
            if info.is_interrupted() {
                warn!(
                    archive = %info.archive_name,
                    started_at = %info.started_at,
                    "previous ingestion did not finish; the image set may be incomplete"
                );
            }
        }

        let cursor = ClassificationCursor::rebuild(&store)?;
        let rows_per_page = results::rows_per_page(&store, config.default_rows_per_page)?;
        info!(
            path = %store.path().display(),
            total = cursor.total_count(),
            classified = cursor.classified_count(),
            "session opened"
        );

        Ok(Self {
            store,
            config,
            cursor,
            filter: LabelFilter::All,
            page: 1,
            rows_per_page,
            ingesting: false,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cursor(&self) -> &ClassificationCursor {
        &self.cursor
    }

    pub fn filter(&self) -> LabelFilter {
        self.filter
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    pub fn is_ingesting(&self) -> bool {
        self.ingesting
    }

    pub fn view(&self) -> View {
        if self.cursor.total_count() == 0 {
            View::Upload
        } else if self.cursor.is_terminal() {
            View::Results
        } else {
            View::Classifying
        }
    }

    /// Interrupted ingestion recorded in the store, if any
    pub fn interrupted_ingestion(&self) -> Result<Option<IngestionInfo>> {
        Ok(self
            .store
            .get::<IngestionInfo>(Collection::AppState, INGESTION_KEY)?
            .filter(IngestionInfo::is_interrupted))
    }

    /// Replace the session's images with the ones in a zip archive
    ///
    /// The current data is cleared before the archive is opened, so an
    /// unreadable archive or one without images leaves an empty store. Dropping
    /// the returned future releases the busy flag and rebuilds the cursor from
    /// whatever the store holds.
    pub async fn ingest(
        &mut self,
        bytes: Vec<u8>,
        archive_name: &str,
        sink: &mut dyn ProgressSink,
    ) -> Result<IngestReport> {
        if self.ingesting {
            return Err(ClassifierError::IngestionInProgress);
        }
        let mut guard = IngestGuard::new(self);
        let result = guard.session.ingest_inner(bytes, archive_name, sink).await;
        drop(guard);
        result
    }

    pub async fn ingest_file(&mut self, path: &Path, sink: &mut dyn ProgressSink) -> Result<IngestReport> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClassifierError::ArchiveUnreadable(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest(bytes, &name, sink).await
    }

    async fn ingest_inner(
        &mut self,
        bytes: Vec<u8>,
        archive_name: &str,
        sink: &mut dyn ProgressSink,
    ) -> Result<IngestReport> {
        clear_session_data(&mut self.store).await?;
        self.filter = LabelFilter::All;
        self.page = 1;
        self.rows_per_page = self.config.default_rows_per_page;

        let mut source = ZipSource::from_bytes(bytes)?;
        let suffix = self.config.extension_suffix();
        if select_entries(source.entries(), &suffix).is_empty() {
            return Err(ClassifierError::NoImagesFound);
        }

        let options = IngestOptions {
            archive_name: archive_name.to_string(),
            extension_suffix: suffix,
            batch_size: self.config.ingest_batch_size,
        };
        ingest_archive(&mut self.store, &mut source, &options, sink).await
    }

    /// Label the current image and move to the next one
    pub async fn on_advance(&mut self, label: Label) -> Result<View> {
        self.cursor.advance(&mut self.store, label).await?;
        Ok(self.view())
    }

    /// Step back one image, clearing its label
    pub async fn on_retreat(&mut self) -> Result<View> {
        self.cursor.retreat(&mut self.store).await?;
        Ok(self.view())
    }

    pub fn on_set_filter(&mut self, filter: LabelFilter) {
        self.filter = filter;
        self.page = 1;
    }

    pub fn on_set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub async fn on_set_rows_per_page(&mut self, rows_per_page: usize) -> Result<()> {
        results::set_rows_per_page(&mut self.store, rows_per_page).await?;
        self.rows_per_page = rows_per_page;
        self.page = 1;
        Ok(())
    }

    pub async fn on_set_label(&mut self, file_name: &str, label: Option<Label>) -> Result<()> {
        results::set_label(&mut self.store, &mut self.cursor, file_name, label).await
    }

    /// Current page of the results view
    pub fn results_page(&self) -> Result<ResultsPage> {
        results::list(&self.store, self.filter, self.page, self.rows_per_page)
    }

    /// Record whose external id or file name equals `key`
    pub fn find_records(&self, key: &str) -> Result<Vec<ItemRecord>> {
        let records: Vec<ItemRecord> = self.store.get_all(Collection::Stars)?;
        Ok(records
            .into_iter()
            .filter(|r| r.file_name == key || r.external_id == key)
            .collect())
    }

    pub fn export_rows(&self, scope: ExportScope) -> Result<Vec<ExportRow>> {
        transfer::export_rows(&self.store, |r| scope.matches(r))
    }

    /// Write the results workbook; `include_all` adds a sheet with every record
    pub async fn export_workbook(&self, path: &Path, scope: ExportScope, include_all: bool) -> Result<usize> {
        let rows = self.export_rows(scope)?;
        let all_rows = if include_all {
            Some(self.export_rows(ExportScope::All)?)
        } else {
            None
        };
        transfer::write_workbook(path, &rows, all_rows.as_deref()).await?;
        Ok(rows.len())
    }

    pub async fn import_rows(&mut self, rows: &[ImportRow]) -> Result<ImportSummary> {
        let summary = transfer::import_rows(&mut self.store, rows).await?;
        self.cursor = ClassificationCursor::rebuild(&self.store)?;
        Ok(summary)
    }

    pub async fn import_tsv(&mut self, text: &str) -> Result<ImportSummary> {
        let rows = transfer::parse_import_text(text)?;
        self.import_rows(&rows).await
    }

    pub async fn import_file(&mut self, path: &Path) -> Result<ImportSummary> {
        let rows = transfer::read_import_file(path).await?;
        self.import_rows(&rows).await
    }

    /// Image under the cursor, written to a temp file for viewing
    pub async fn current_preview(&self) -> Result<Option<ImagePreview>> {
        let Some(file_name) = self.cursor.current() else {
            return Ok(None);
        };
        self.preview(file_name).await.map(Some)
    }

    pub async fn preview(&self, file_name: &str) -> Result<ImagePreview> {
        let bytes = self
            .store
            .get_image(file_name)
            .await?
            .ok_or_else(|| ClassifierError::RecordNotFound(file_name.to_string()))?;
        ImagePreview::new(file_name, &bytes)
    }

    /// Copy a stored image to `path`
    pub async fn save_image(&self, file_name: &str, path: &Path) -> Result<usize> {
        let bytes = self
            .store
            .get_image(file_name)
            .await?
            .ok_or_else(|| ClassifierError::RecordNotFound(file_name.to_string()))?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| ClassifierError::ClipboardOrExportFailed(format!("{}: {}", path.display(), e)))?;
        Ok(bytes.len())
    }

    /// Drop every image, record and view setting
    pub async fn reset(&mut self) -> Result<()> {
        clear_session_data(&mut self.store).await?;
        self.cursor = ClassificationCursor::rebuild(&self.store)?;
        self.filter = LabelFilter::All;
        self.page = 1;
        self.rows_per_page = self.config.default_rows_per_page;
        self.ingesting = false;
        info!("session reset");
        Ok(())
    }
}

/// Marks the session busy for one ingestion
///
/// Runs on drop, so a cancelled ingestion future is cleaned up the same way
/// as a finished one.
struct IngestGuard<'a> {
    session: &'a mut Session,
}

impl<'a> IngestGuard<'a> {
    fn new(session: &'a mut Session) -> Self {
        session.ingesting = true;
        Self { session }
    }
}

impl Drop for IngestGuard<'_> {
    fn drop(&mut self) {
        self.session.ingesting = false;
        // the store may hold a partial image set after a failed batch
        match ClassificationCursor::rebuild(&self.session.store) {
            Ok(cursor) => self.session.cursor = cursor,
            Err(e) => {
                warn!(error = %e, "cursor rebuild after ingestion failed");
                self.session.cursor = ClassificationCursor::default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::test_support::zip_bytes;
    use crate::ingest::NoProgress;
    use tempfile::tempdir;

    async fn ingested_session(dir: &Path) -> Session {
        let mut session = Session::open_at(dir, Config::default()).await.unwrap();
        let bytes = zip_bytes(&[
            ("a/TIC_100_x.png", b"x"),
            ("a/TIC_200_y.png", b"y"),
            ("a/b/TIC_999_z.png", b"z"),
        ]);
        session.ingest(bytes, "stars.zip", &mut NoProgress).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_view_follows_progress() {
        let dir = tempdir().unwrap();
        let mut session = Session::open_at(dir.path(), Config::default()).await.unwrap();
        assert_eq!(session.view(), View::Upload);

        let bytes = zip_bytes(&[("TIC_1_a.png", b"a")]);
        session.ingest(bytes, "one.zip", &mut NoProgress).await.unwrap();
        assert_eq!(session.view(), View::Classifying);

        let view = session.on_advance(Label::Yes).await.unwrap();
        assert_eq!(view, View::Results);
        assert_eq!(session.on_retreat().await.unwrap(), View::Classifying);
    }

    #[tokio::test]
    async fn test_ingest_without_images_clears_data() {
        let dir = tempdir().unwrap();
        let mut session = ingested_session(dir.path()).await;

        let result = session
            .ingest(zip_bytes(&[("notes.txt", b"n")]), "empty.zip", &mut NoProgress)
            .await;
        assert!(matches!(result, Err(ClassifierError::NoImagesFound)));
        assert_eq!(session.cursor().total_count(), 0);
        assert_eq!(session.store().count(Collection::Images), 0);
        assert_eq!(session.view(), View::Upload);
        assert!(!session.is_ingesting());
    }

    #[tokio::test]
    async fn test_unreadable_archive_leaves_store_cleared() {
        let dir = tempdir().unwrap();
        let mut session = ingested_session(dir.path()).await;
        session.on_set_filter(LabelFilter::Yes);

        let result = session
            .ingest(b"not a zip".to_vec(), "broken.zip", &mut NoProgress)
            .await;
        assert!(matches!(result, Err(ClassifierError::ArchiveUnreadable(_))));
        assert_eq!(session.cursor().total_count(), 0);
        assert_eq!(session.store().count(Collection::Stars), 0);
        assert_eq!(session.store().count(Collection::Images), 0);
        assert_eq!(session.filter(), LabelFilter::All);
    }

    #[tokio::test]
    async fn test_dropped_ingestion_releases_session() {
        use std::future::Future;
        use std::task::Poll;

        let dir = tempdir().unwrap();
        let mut session = ingested_session(dir.path()).await;
        let bytes = zip_bytes(&[("TIC_5_new.png", b"new"), ("TIC_6_new.png", b"new")]);

        {
            // poll once so the ingestion is under way, then abandon it
            let mut sink = NoProgress;
            let mut pending = Box::pin(session.ingest(bytes.clone(), "new.zip", &mut sink));
            std::future::poll_fn(|cx| {
                let _ = pending.as_mut().poll(cx);
                Poll::Ready(())
            })
            .await;
        }
        // let the abandoned blocking file operation settle
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(!session.is_ingesting());
        assert_eq!(
            session.cursor().total_count(),
            session.store().count(Collection::Stars)
        );

        let report = session.ingest(bytes, "new.zip", &mut NoProgress).await.unwrap();
        assert_eq!(report.stored, 2);
        assert_eq!(session.cursor().total_count(), 2);
    }

    #[tokio::test]
    async fn test_ingest_replaces_previous_set() {
        let dir = tempdir().unwrap();
        let mut session = ingested_session(dir.path()).await;
        session.on_advance(Label::No).await.unwrap();

        let bytes = zip_bytes(&[("TIC_5_new.png", b"new")]);
        session.ingest(bytes, "new.zip", &mut NoProgress).await.unwrap();

        assert_eq!(session.cursor().total_count(), 1);
        assert_eq!(session.cursor().classified_count(), 0);
        assert_eq!(session.store().keys(Collection::Stars), vec!["TIC_5_new.png"]);
    }

    #[tokio::test]
    async fn test_rows_per_page_resets_page() {
        let dir = tempdir().unwrap();
        let mut session = ingested_session(dir.path()).await;
        session.on_set_page(2);
        session.on_set_rows_per_page(1).await.unwrap();
        assert_eq!(session.page(), 1);

        session.on_set_page(2);
        let page = session.results_page().unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].external_id, "200");

        session.on_set_filter(LabelFilter::Yes);
        assert_eq!(session.page(), 1);
        assert_eq!(session.results_page().unwrap().total_filtered, 0);
    }

    #[tokio::test]
    async fn test_import_rebuilds_cursor() {
        let dir = tempdir().unwrap();
        let mut session = ingested_session(dir.path()).await;
        let summary = session
            .import_tsv("External ID\tDiscoverer\tLabel\n100\t\tТак\n")
            .await
            .unwrap();
        assert_eq!(summary.forced_no, 1);
        assert!(session.cursor().is_terminal());
        assert_eq!(session.cursor().classified_count(), 2);
        assert_eq!(session.view(), View::Results);
    }

    #[tokio::test]
    async fn test_current_preview() {
        let dir = tempdir().unwrap();
        let session = ingested_session(dir.path()).await;
        let preview = session.current_preview().await.unwrap().unwrap();
        assert_eq!(preview.file_name, "TIC_100_x.png");
        assert_eq!(std::fs::read(preview.path()).unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_save_image_copies_stored_bytes() {
        let dir = tempdir().unwrap();
        let session = ingested_session(dir.path()).await;
        let out = tempdir().unwrap();
        let target = out.path().join("saved.png");

        let written = session.save_image("TIC_200_y.png", &target).await.unwrap();
        assert_eq!(written, 1);
        assert_eq!(std::fs::read(&target).unwrap(), b"y");

        let missing = session.save_image("TIC_999_z.png", &target).await;
        assert!(matches!(missing, Err(ClassifierError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let dir = tempdir().unwrap();
        let mut session = ingested_session(dir.path()).await;
        session.reset().await.unwrap();
        assert_eq!(session.view(), View::Upload);
        assert_eq!(session.store().count(Collection::Images), 0);
        assert!(session.interrupted_ingestion().unwrap().is_none());
    }
}

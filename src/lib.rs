//! Resumable image labeling for TIC star archives
//!
//! The library holds the persistent store, the ingestion pipeline, the
//! classification cursor and the results/transfer views. [`session::Session`]
//! ties them together behind one command interface.

pub mod cli;
pub mod config;
pub mod cursor;
pub mod error;
pub mod ingest;
pub mod preview;
pub mod results;
pub mod session;
pub mod store;
pub mod terminal;
pub mod transfer;

pub use cursor::ClassificationCursor;
pub use error::{ClassifierError, Result};
pub use session::{Session, View};
pub use star_classifier_common::{ExportRow, ImportRow, ItemRecord, Label, LabelFilter};

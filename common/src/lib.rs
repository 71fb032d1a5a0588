//! Star Classifier Common Library
//!
//! Types, table layout and exporters shared by the store and any front end

pub mod types;
pub mod layout;
pub mod error;
pub mod parser;
pub mod export;

pub use types::{
    extract_external_id, ExportRow, ImportRow, ItemRecord, Label, LabelFilter,
    UNKNOWN_EXTERNAL_ID,
};
pub use error::{Error, Result};
pub use parser::{parse_table, parse_tsv};
pub use export::tsv::format_tsv;

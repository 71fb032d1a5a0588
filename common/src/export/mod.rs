//! Export core modules shared by every front end.

pub mod tsv;

#[cfg(feature = "excel")]
pub mod excel_core;

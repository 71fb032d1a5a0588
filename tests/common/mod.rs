//! Shared fixtures for the integration tests
//!
//! `ingest::test_support` only exists under `cfg(test)` of the library, so the
//! zip builder is repeated here.

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

/// Build an in-memory zip; names ending in `/` become directories
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        let options = SimpleFileOptions::default();
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// The two-star archive used across scenarios, with one nested decoy
pub fn two_star_archive() -> Vec<u8> {
    zip_bytes(&[
        ("a/", b""),
        ("a/TIC_100_x.png", b"hundred"),
        ("a/TIC_200_y.png", b"two hundred"),
        ("a/b/", b""),
        ("a/b/TIC_999_z.png", b"nested"),
    ])
}

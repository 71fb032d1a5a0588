//! Record and label types
//!
//! Shared by the store, the classification cursor and every exporter:
//! - Label: the three classification answers
//! - ItemRecord: one labeled (or not yet labeled) image
//! - LabelFilter: results view filter
//! - ExportRow: one row of the interchange table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Placeholder used when a file name carries no TIC number.
pub const UNKNOWN_EXTERNAL_ID: &str = "N/A";

/// Classification answer for one image.
///
/// Serialized with the tool's display strings so stored records and exported
/// tables read the same; the English names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "Так", alias = "Yes")]
    Yes,
    #[serde(rename = "Ні", alias = "No")]
    No,
    #[serde(rename = "Проблематично визначити", alias = "Ambiguous")]
    Ambiguous,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Yes, Label::No, Label::Ambiguous];

    /// Display string written to tables and the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Yes => "Так",
            Label::No => "Ні",
            Label::Ambiguous => "Проблематично визначити",
        }
    }

    /// Parse an optional label cell: empty text means "no label".
    pub fn parse_cell(cell: &str) -> Result<Option<Label>> {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Some(label) = Label::ALL.iter().find(|l| l.as_str() == trimmed) {
            return Ok(*label);
        }
        match trimmed.to_lowercase().as_str() {
            "yes" | "y" | "так" => Ok(Label::Yes),
            "no" | "n" | "ні" => Ok(Label::No),
            "ambiguous" | "a" | "problematic" | "проблематично визначити" => Ok(Label::Ambiguous),
            _ => Err(Error::UnknownLabel(trimmed.to_string())),
        }
    }
}

/// One extracted image and its classification state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub file_name: String,

    #[serde(default = "unknown_external_id")]
    pub external_id: String,

    #[serde(default)]
    pub label: Option<Label>,
}

fn unknown_external_id() -> String {
    UNKNOWN_EXTERNAL_ID.to_string()
}

impl ItemRecord {
    /// New unlabeled record; the external id is derived from the file name.
    pub fn new(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let external_id = extract_external_id(&file_name);
        Self {
            file_name,
            external_id,
            label: None,
        }
    }

    pub fn with_label(mut self, label: Option<Label>) -> Self {
        self.label = label;
        self
    }

    pub fn is_labeled(&self) -> bool {
        self.label.is_some()
    }
}

/// Extract the TIC number from a file name (`TIC_<digits>_`).
///
/// Returns `"N/A"` when the pattern is absent.
pub fn extract_external_id(file_name: &str) -> String {
    lazy_static::lazy_static! {
        static ref TIC_RE: regex::Regex = regex::Regex::new(r"TIC_(\d+)_").unwrap();
    }

    TIC_RE
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(unknown_external_id)
}

/// Results view filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelFilter {
    #[default]
    All,
    Unlabeled,
    Yes,
    No,
    Ambiguous,
}

impl LabelFilter {
    pub fn matches(&self, record: &ItemRecord) -> bool {
        match self {
            LabelFilter::All => true,
            LabelFilter::Unlabeled => record.label.is_none(),
            LabelFilter::Yes => record.label == Some(Label::Yes),
            LabelFilter::No => record.label == Some(Label::No),
            LabelFilter::Ambiguous => record.label == Some(Label::Ambiguous),
        }
    }
}

impl FromStr for LabelFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(LabelFilter::All),
            "unlabeled" | "none" => Ok(LabelFilter::Unlabeled),
            "yes" => Ok(LabelFilter::Yes),
            "no" => Ok(LabelFilter::No),
            "ambiguous" => Ok(LabelFilter::Ambiguous),
            _ => Err(format!(
                "Unknown filter: {}. Use all, unlabeled, yes, no or ambiguous",
                s
            )),
        }
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LabelFilter::All => "all",
            LabelFilter::Unlabeled => "unlabeled",
            LabelFilter::Yes => "yes",
            LabelFilter::No => "no",
            LabelFilter::Ambiguous => "ambiguous",
        };
        f.write_str(name)
    }
}

/// One row of the interchange table: `External ID | Discoverer | Label`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub external_id: String,
    /// Always blank on export; filled in by hand downstream.
    pub discoverer: String,
    pub label: Option<Label>,
}

impl From<&ItemRecord> for ExportRow {
    fn from(record: &ItemRecord) -> Self {
        Self {
            external_id: record.external_id.clone(),
            discoverer: String::new(),
            label: record.label,
        }
    }
}

/// One parsed import row. Only the id and label columns are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    /// 1-based line (or sheet row) the row came from
    pub line: usize,
    pub external_id: String,
    pub label: Option<Label>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_external_id() {
        assert_eq!(extract_external_id("TIC_100_x.png"), "100");
        assert_eq!(extract_external_id("sector_TIC_2345678_lc.png"), "2345678");
        assert_eq!(extract_external_id("TIC_abc_x.png"), "N/A");
        assert_eq!(extract_external_id("TIC_100.png"), "N/A");
        assert_eq!(extract_external_id("plain.png"), "N/A");
    }

    #[test]
    fn test_record_new_derives_id() {
        let record = ItemRecord::new("TIC_200_y.png");
        assert_eq!(record.external_id, "200");
        assert_eq!(record.label, None);
        assert!(!record.is_labeled());
    }

    #[test]
    fn test_label_parse_both_spellings() {
        assert_eq!("Так".parse::<Label>().unwrap(), Label::Yes);
        assert_eq!("yes".parse::<Label>().unwrap(), Label::Yes);
        assert_eq!(" Ні ".parse::<Label>().unwrap(), Label::No);
        assert_eq!("Ambiguous".parse::<Label>().unwrap(), Label::Ambiguous);
        assert_eq!(
            "Проблематично визначити".parse::<Label>().unwrap(),
            Label::Ambiguous
        );
        assert!("maybe".parse::<Label>().is_err());
    }

    #[test]
    fn test_label_parse_cell_empty() {
        assert_eq!(Label::parse_cell("").unwrap(), None);
        assert_eq!(Label::parse_cell("   ").unwrap(), None);
        assert_eq!(Label::parse_cell("Ні").unwrap(), Some(Label::No));
    }

    #[test]
    fn test_record_serialize() {
        let record = ItemRecord::new("TIC_100_x.png").with_label(Some(Label::Yes));
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains("\"fileName\":\"TIC_100_x.png\""));
        assert!(json.contains("\"externalId\":\"100\""));
        assert!(json.contains("\"label\":\"Так\""));
    }

    #[test]
    fn test_record_deserialize_english_label_and_null() {
        let json = r#"{"fileName": "a.png", "externalId": "N/A", "label": "Ambiguous"}"#;
        let record: ItemRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.label, Some(Label::Ambiguous));

        let json = r#"{"fileName": "b.png", "label": null}"#;
        let record: ItemRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.external_id, "N/A");
        assert_eq!(record.label, None);
    }

    #[test]
    fn test_filter_matches() {
        let unlabeled = ItemRecord::new("a.png");
        let yes = ItemRecord::new("b.png").with_label(Some(Label::Yes));

        assert!(LabelFilter::All.matches(&unlabeled));
        assert!(LabelFilter::Unlabeled.matches(&unlabeled));
        assert!(!LabelFilter::Unlabeled.matches(&yes));
        assert!(LabelFilter::Yes.matches(&yes));
        assert!(!LabelFilter::No.matches(&yes));
    }

    #[test]
    fn test_filter_from_str() {
        assert_eq!("Unlabeled".parse::<LabelFilter>().unwrap(), LabelFilter::Unlabeled);
        assert_eq!("ambiguous".parse::<LabelFilter>().unwrap(), LabelFilter::Ambiguous);
        assert!("other".parse::<LabelFilter>().is_err());
    }
}

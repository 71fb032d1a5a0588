use clap::{Parser, Subcommand};
use star_classifier_common::{Label, LabelFilter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "star-classifier")]
#[command(about = "Label TIC star images from a zip archive and export the results", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Store directory (overrides the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a zip archive, replacing the current image set
    Ingest {
        /// Zip archive with the star images
        #[arg(required = true)]
        archive: PathBuf,

        /// Replace existing data without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Label the unlabeled images one by one
    Classify,

    /// Show progress
    Status,

    /// List records page by page
    Results {
        /// all / unlabeled / yes / no / ambiguous
        #[arg(short, long, default_value = "all")]
        filter: LabelFilter,

        /// 1-based page number
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Rows per page (saved for later runs)
        #[arg(short, long)]
        rows: Option<usize>,
    },

    /// Set or clear the label of one record
    Label {
        /// File name or external id
        #[arg(required = true)]
        record: String,

        /// Label (yes/no/ambiguous or Так/Ні/Проблематично визначити)
        #[arg(conflicts_with = "clear")]
        label: Option<Label>,

        /// Clear the label instead
        #[arg(long)]
        clear: bool,
    },

    /// Write the results workbook
    Export {
        /// Output file (default from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export every record instead of Yes + Ambiguous
        #[arg(long)]
        all: bool,

        /// Add a second sheet with every record
        #[arg(long)]
        with_all_sheet: bool,

        /// Write tab-separated text instead of a workbook
        #[arg(long)]
        tsv: bool,
    },

    /// Print the results as tab-separated text for pasting
    Copy {
        /// Include every record instead of Yes + Ambiguous
        #[arg(long)]
        all: bool,
    },

    /// Apply a complete label table (unlisted records become "No")
    Import {
        /// TSV or xlsx file; reads TSV from stdin when omitted
        input: Option<PathBuf>,
    },

    /// Save the image of one record to a file
    Show {
        /// File name or external id
        #[arg(required = true)]
        record: String,

        /// Destination (default: the record's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete every image and label
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show or edit the configuration
    Config {
        /// Show the configuration
        #[arg(long)]
        show: bool,

        /// Set the store directory
        #[arg(long)]
        set_data_dir: Option<PathBuf>,

        /// Set the default rows per page
        #[arg(long)]
        set_rows_per_page: Option<usize>,

        /// Set the accepted image extension
        #[arg(long)]
        set_extension: Option<String>,

        /// Set the number of images committed per ingestion batch
        #[arg(long)]
        set_batch_size: Option<usize>,
    },
}

use anyhow::{bail, Context};
use clap::Parser;
use star_classifier::cli::{Cli, Commands};
use star_classifier::config::Config;
use star_classifier::error::ClassifierError;
use star_classifier::session::{Session, View};
use star_classifier::terminal::{self, BarProgress};
use star_classifier::transfer::{rows_to_tsv, write_tsv, ExportScope};
use star_classifier_common::ItemRecord;
use std::io::Read;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load().context("failed to load config")?;
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = Some(dir);
    }

    let command = match cli.command {
        Commands::Config {
            show,
            set_data_dir,
            set_rows_per_page,
            set_extension,
            set_batch_size,
        } => {
            return run_config(show, set_data_dir, set_rows_per_page, set_extension, set_batch_size)
        }
        command => command,
    };

    let mut session = Session::open(config)
        .await
        .context("failed to open the store")?;

    match command {
        Commands::Ingest { archive, yes } => {
            let existing = session.cursor().total_count();
            if existing > 0
                && !yes
                && !terminal::confirm(&format!("Replace the {} images already loaded?", existing))?
            {
                println!("Cancelled");
                return Ok(());
            }

            println!("📦 Loading {}", archive.display());
            let mut progress = BarProgress::new();
            match session.ingest_file(&archive, &mut progress).await {
                Ok(report) => {
                    println!("✔ {} images loaded", report.stored);
                    if report.matched > report.kept {
                        println!(
                            "  {} images in subfolders were skipped",
                            report.matched - report.kept
                        );
                    }
                    if !report.duplicates.is_empty() {
                        println!(
                            "  ⚠ duplicate file names (last one kept): {}",
                            report.duplicates.join(", ")
                        );
                    }
                }
                Err(ClassifierError::NoImagesFound) => {
                    println!("No PNG images found in the archive; the previous images were cleared");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to ingest {}", archive.display()))
                }
            }
        }

        Commands::Classify => {
            terminal::run_classify(&mut session).await?;
        }

        Commands::Status => {
            let cursor = session.cursor();
            println!("store:      {}", session.store().path().display());
            println!("images:     {}", cursor.total_count());
            println!("classified: {}", cursor.classified_count());
            println!(
                "remaining:  {}",
                cursor.total_count() - cursor.classified_count()
            );
            println!("rows/page:  {}", session.rows_per_page());
            let view = match session.view() {
                View::Upload => "waiting for an archive",
                View::Classifying => "classifying",
                View::Results => "done, reviewing results",
            };
            println!("state:      {}", view);
            if let Some(info) = session.interrupted_ingestion()? {
                println!(
                    "⚠ ingestion of {} started {} did not finish; run `ingest` again",
                    info.archive_name,
                    info.started_at.format("%Y-%m-%d %H:%M")
                );
            }
        }

        Commands::Results { filter, page, rows } => {
            if let Some(rows) = rows {
                session.on_set_rows_per_page(rows).await?;
            }
            session.on_set_filter(filter);
            session.on_set_page(page);

            let page = session.results_page()?;
            for record in &page.items {
                println!("{}", format_record(record));
            }
            println!(
                "--- page {}/{} ({} records, filter: {})",
                page.page,
                page.page_count.max(1),
                page.total_filtered,
                session.filter()
            );
        }

        Commands::Label {
            record,
            label,
            clear,
        } => {
            if label.is_none() && !clear {
                bail!("give a label or --clear");
            }
            let records = session.find_records(&record)?;
            if records.is_empty() {
                return Err(ClassifierError::RecordNotFound(record).into());
            }
            for item in &records {
                session.on_set_label(&item.file_name, label).await?;
                println!(
                    "✔ {} → {}",
                    item.file_name,
                    label.map(|l| l.to_string()).unwrap_or_else(|| "—".into())
                );
            }
        }

        Commands::Export {
            output,
            all,
            with_all_sheet,
            tsv,
        } => {
            let scope = if all { ExportScope::All } else { ExportScope::Flagged };
            let mut path =
                output.unwrap_or_else(|| PathBuf::from(&session.config().export_file_name));

            if tsv {
                if path.extension().map(|e| e == "xlsx").unwrap_or(false) {
                    path.set_extension("tsv");
                }
                let rows = session.export_rows(scope)?;
                write_tsv(&path, &rows).await?;
                println!("✔ {} rows written to {}", rows.len(), path.display());
            } else {
                let count = session
                    .export_workbook(&path, scope, with_all_sheet)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("✔ {} rows written to {}", count, path.display());
            }
        }

        Commands::Copy { all } => {
            let scope = if all { ExportScope::All } else { ExportScope::Flagged };
            let rows = session.export_rows(scope)?;
            print!("{}", rows_to_tsv(&rows));
        }

        Commands::Import { input } => {
            let summary = match input {
                Some(path) => session
                    .import_file(&path)
                    .await
                    .with_context(|| format!("failed to import {}", path.display()))?,
                None => {
                    let mut text = String::new();
                    std::io::stdin()
                        .read_to_string(&mut text)
                        .context("failed to read stdin")?;
                    session.import_tsv(&text).await?
                }
            };
            println!(
                "✔ Imported {} rows: {} records labeled, {} set to Ні",
                summary.rows, summary.listed, summary.forced_no
            );
        }

        Commands::Show { record, output } => {
            let records = session.find_records(&record)?;
            let Some(item) = records.first() else {
                return Err(ClassifierError::RecordNotFound(record).into());
            };
            if let Some((w, h)) = session.preview(&item.file_name).await?.dimensions {
                println!("{} ({}x{})", item.file_name, w, h);
            }
            let target = output.unwrap_or_else(|| PathBuf::from(&item.file_name));
            let written = session.save_image(&item.file_name, &target).await?;
            println!("✔ Saved {} ({} bytes)", target.display(), written);
        }

        Commands::Reset { yes } => {
            if !yes && !terminal::confirm("Delete every image and label?")? {
                println!("Cancelled");
                return Ok(());
            }
            session.reset().await?;
            println!("✔ Store cleared");
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

/// `config` subcommand; runs without opening the store
fn run_config(
    show: bool,
    set_data_dir: Option<PathBuf>,
    set_rows_per_page: Option<usize>,
    set_extension: Option<String>,
    set_batch_size: Option<usize>,
) -> anyhow::Result<()> {
    let mut config = Config::load().context("failed to load config")?;
    let mut changed = false;
    if let Some(dir) = set_data_dir {
        config.data_dir = Some(dir);
        changed = true;
    }
    if let Some(rows) = set_rows_per_page {
        config.default_rows_per_page = rows;
        changed = true;
    }
    if let Some(ext) = set_extension {
        config.image_extension = ext;
        changed = true;
    }
    if let Some(size) = set_batch_size {
        config.ingest_batch_size = size;
        changed = true;
    }

    if changed {
        config.save().context("failed to save config")?;
        println!("✔ Config saved: {}", Config::config_path()?.display());
    }
    if show || !changed {
        println!("{}", serde_json::to_string_pretty(&config)?);
        println!("store: {}", config.store_dir()?.display());
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}

fn format_record(record: &ItemRecord) -> String {
    let label = record.label.map(|l| l.as_str()).unwrap_or("—");
    format!("{:<12} {:<40} {}", record.external_id, record.file_name, label)
}

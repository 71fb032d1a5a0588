//! Terminal front end: interactive labeling loop, prompts and progress bar

use crate::error::{ClassifierError, Result};
use crate::ingest::ProgressSink;
use crate::session::{Session, View};
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use star_classifier_common::Label;

/// One keypress worth of input in the classify loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyAction {
    Label(Label),
    /// Undo the previous answer
    Back,
    Quit,
}

/// Map typed input to an action; `None` means "ask again"
pub fn parse_action(input: &str) -> Option<ClassifyAction> {
    match input.trim() {
        "y" | "Y" | "1" => Some(ClassifyAction::Label(Label::Yes)),
        "n" | "N" | "2" => Some(ClassifyAction::Label(Label::No)),
        "a" | "A" | "3" | "?" => Some(ClassifyAction::Label(Label::Ambiguous)),
        "b" | "B" => Some(ClassifyAction::Back),
        "q" | "Q" => Some(ClassifyAction::Quit),
        other => other.parse::<Label>().ok().map(ClassifyAction::Label),
    }
}

/// Walk the unlabeled images until every one is answered or the user quits
pub async fn run_classify(session: &mut Session) -> Result<()> {
    if session.view() == View::Upload {
        println!("No images loaded. Run `star-classifier ingest <archive.zip>` first.");
        return Ok(());
    }
    if session.cursor().is_empty() {
        println!("✓ Every image already has a label");
        return Ok(());
    }

    println!(
        "Unlabeled images: {} (of {})",
        session.cursor().len(),
        session.cursor().total_count()
    );
    println!("---");
    println!("Keys: [y] Так  [n] Ні  [a] Проблематично визначити  [b] back  [q] quit");
    println!("---\n");

    loop {
        let Some(preview) = session.current_preview().await? else {
            break;
        };

        let cursor = session.cursor();
        let record_id = star_classifier_common::extract_external_id(&preview.file_name);
        let size = preview
            .dimensions
            .map(|(w, h)| format!(" {}x{}", w, h))
            .unwrap_or_default();
        println!(
            "[{}/{}] TIC {} ({}{})",
            cursor.position() + 1,
            cursor.len(),
            record_id,
            preview.file_name,
            size
        );
        println!("  image: {}", preview.path().display());

        let action = prompt_action()?;
        drop(preview);

        match action {
            ClassifyAction::Label(label) => {
                session.on_advance(label).await?;
                println!("  → {}\n", label);
            }
            ClassifyAction::Back => {
                if session.cursor().position() == 0 {
                    println!("  → already at the first image\n");
                } else {
                    session.on_retreat().await?;
                    println!("  → back\n");
                }
            }
            ClassifyAction::Quit => {
                println!("Progress is saved.");
                break;
            }
        }
    }

    let cursor = session.cursor();
    println!(
        "\n✓ Classified {} of {} images",
        cursor.classified_count(),
        cursor.total_count()
    );
    if session.view() == View::Results {
        println!("All images reviewed. See `star-classifier results` or `star-classifier export`.");
    }
    Ok(())
}

fn prompt_action() -> Result<ClassifyAction> {
    loop {
        let input: String = Input::new()
            .with_prompt("Variable star? (y/n/a, b: back, q: quit)")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| ClassifierError::InvalidArgument(e.to_string()))?;

        match parse_action(&input) {
            Some(action) => return Ok(action),
            None => println!("  unknown answer: {}", input.trim()),
        }
    }
}

/// Yes/no question, defaulting to no
pub fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| ClassifierError::InvalidArgument(e.to_string()))
}

/// Progress bar for archive extraction
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self { bar: None }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn start(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} images ({eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        self.bar = Some(bar);
    }

    fn advance(&mut self, processed: usize, _total: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(processed as u64);
        }
    }

    fn finish(&mut self, stored: usize) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{} images stored", stored));
        }
    }
}

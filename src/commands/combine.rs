use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::books;
use crate::catalog::{self, Translation};
use crate::cli::CombineArgs;
use crate::commands::generate::{self, DownloadSummary, TranslationReport};
use crate::layout::TranslationLayout;
use crate::model::{BibleDocument, GenerateRunManifest, INFO_KEY};

pub fn run(args: CombineArgs) -> Result<()> {
    let translation = catalog::resolve(&args.translation)?;
    let layout = TranslationLayout::new(&args.output_root, translation.id);

    info!(
        translation = translation.id,
        books_dir = %layout.books_dir.display(),
        "combining existing book files"
    );

    let report = combine_translation(translation, &layout)?;
    info!(
        translation = translation.id,
        books = report.books_merged,
        verses = report.verses,
        failed_book = ?report.failed_book,
        "combine completed"
    );

    Ok(())
}

/// Re-merges and re-exports a translation from its book files. Download
/// details (provider, counts, failed book) are carried over from the previous
/// run manifest so a partial download stays marked as partial.
pub fn combine_translation(
    translation: &Translation,
    layout: &TranslationLayout,
) -> Result<TranslationReport> {
    let download = match read_previous_manifest(layout)? {
        Some(previous) => DownloadSummary {
            provider: previous.provider,
            books_requested: previous.counts.books_requested,
            books_downloaded: previous.counts.books_downloaded,
            failed_book: previous.failed_book,
        },
        None => DownloadSummary::default(),
    };

    generate::combine_and_export(translation, layout, Utc::now(), download)
}

fn read_previous_manifest(layout: &TranslationLayout) -> Result<Option<GenerateRunManifest>> {
    if !layout.manifest_path.exists() {
        return Ok(None);
    }

    let raw = fs::read(&layout.manifest_path)
        .with_context(|| format!("failed to read {}", layout.manifest_path.display()))?;
    let manifest = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", layout.manifest_path.display()))?;
    Ok(Some(manifest))
}

/// Collapses whitespace runs, doubles single quotes and trims verse text.
pub struct VerseCleaner {
    whitespace: Regex,
}

impl VerseCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            whitespace: Regex::new(r"\s+").context("failed to compile whitespace regex")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let collapsed = self.whitespace.replace_all(text, " ");
        collapsed.replace('\'', "''").trim().to_string()
    }
}

#[derive(Debug)]
pub struct CombineOutcome {
    pub document: BibleDocument,
    pub files_merged: usize,
}

/// Merges every `*.json` book file in `folder` into one document. Files are
/// taken in canonical book order; later files replace earlier books with the
/// same name.
pub fn combine_folder(folder: &Path) -> Result<CombineOutcome> {
    let cleaner = VerseCleaner::new()?;
    let mut document = BibleDocument::default();

    let files = discover_book_files(folder)?;
    for path in &files {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let mut map: Map<String, Value> = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if map.shift_remove(INFO_KEY).is_some() {
            debug!(path = %path.display(), "stripped info section");
        }

        let mut parsed = BibleDocument::from_json_map(map)
            .with_context(|| format!("unexpected layout in {}", path.display()))?;
        for verse in parsed
            .books
            .iter_mut()
            .flat_map(|book| book.chapters.iter_mut())
            .flat_map(|chapter| chapter.verses.iter_mut())
        {
            verse.text = cleaner.clean(&verse.text);
        }

        for book in parsed.books {
            document.upsert_book(book);
        }
    }

    Ok(CombineOutcome {
        document,
        files_merged: files.len(),
    })
}

fn discover_book_files(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.exists() {
        return Ok(Vec::new());
    }

    let entries =
        fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", folder.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "json");
        if is_json {
            files.push(path);
        }
    }

    files.sort_by_cached_key(|path| {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        (books::book_id(&stem).unwrap_or(u32::MAX), stem)
    });

    Ok(files)
}

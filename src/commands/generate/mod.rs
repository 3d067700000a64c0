use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::books::BOOKS;
use crate::catalog::{self, Translation};
use crate::cli::{GenerateAllArgs, GenerateArgs};
use crate::commands::combine::combine_folder;
use crate::commands::export::{export_json, export_sql};
use crate::commands::fetch::{BibleGatewayClient, BookFetcher, FetchOptions, PassageSource};
use crate::layout::TranslationLayout;
use crate::model::{ArtifactHash, GenerateRunManifest, ProviderSettings, RunCounts, RunPaths};
use crate::util::{
    clear_directory, ensure_directory, now_utc_string, sha256_file, utc_compact_string,
    write_json_pretty,
};

#[cfg(test)]
mod tests;

const MANIFEST_VERSION: u32 = 1;

/// Books attempted so far out of the books planned for the whole invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    fn advance(self) -> Self {
        Self {
            completed: self.completed + 1,
            ..self
        }
    }

    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        (self.completed * 100 / self.total).min(100)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Stage {
    ClearOldFiles,
    Downloading,
    Aborted,
    Combining,
    Exporting,
    Done,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::ClearOldFiles => "clear_old_files",
            Self::Downloading => "downloading",
            Self::Aborted => "aborted",
            Self::Combining => "combining",
            Self::Exporting => "exporting",
            Self::Done => "done",
        }
    }
}

/// What the download stage hands over to combine/export.
#[derive(Debug, Clone, Default)]
pub struct DownloadSummary {
    pub provider: Option<ProviderSettings>,
    pub books_requested: usize,
    pub books_downloaded: usize,
    pub failed_book: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranslationReport {
    pub translation: String,
    pub books_downloaded: usize,
    pub failed_book: Option<String>,
    pub books_merged: usize,
    pub chapters: usize,
    pub verses: usize,
    pub insert_statements: usize,
}

impl TranslationReport {
    pub fn is_complete(&self) -> bool {
        self.failed_book.is_none()
    }
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let translation = catalog::resolve(&args.translation)?;
    let options = args.fetch.to_options();
    let client = BibleGatewayClient::new(&options)?;
    let fetcher = BookFetcher::new(&client, options.max_chapters)?;
    let layout = TranslationLayout::new(&args.output_root, translation.id);

    let (report, _) = generate_translation(
        translation,
        &layout,
        &fetcher,
        &options,
        Progress::new(BOOKS.len()),
    )?;

    info!(
        translation = %report.translation,
        downloaded = report.books_downloaded,
        books = report.books_merged,
        verses = report.verses,
        json = %layout.json_path.display(),
        sql = %layout.sql_path.display(),
        "translation exported"
    );

    Ok(())
}

pub fn run_all(args: GenerateAllArgs) -> Result<()> {
    let translations = catalog::bulk_translations();
    let options = args.fetch.to_options();
    let client = BibleGatewayClient::new(&options)?;
    let fetcher = BookFetcher::new(&client, options.max_chapters)?;

    info!(
        translations = translations.len(),
        skipped = ?catalog::EXCLUDED_FROM_BULK,
        "starting whole-catalog run"
    );

    let mut progress = Progress::new(translations.len() * BOOKS.len());
    let mut reports = Vec::with_capacity(translations.len());
    for translation in translations {
        let layout = TranslationLayout::new(&args.output_root, translation.id);
        let (report, next) =
            generate_translation(translation, &layout, &fetcher, &options, progress)?;
        progress = next;
        reports.push(report);
    }

    let incomplete = reports
        .iter()
        .filter(|report| !report.is_complete())
        .map(|report| report.translation.as_str())
        .collect::<Vec<_>>();
    let downloaded: usize = reports.iter().map(|report| report.books_downloaded).sum();
    let verses: usize = reports.iter().map(|report| report.verses).sum();

    if incomplete.is_empty() {
        info!(
            translations = reports.len(),
            downloaded,
            verses,
            "all translations downloaded"
        );
    } else {
        warn!(
            translations = reports.len(),
            downloaded,
            verses,
            incomplete = ?incomplete,
            "catalog run finished with incomplete translations"
        );
    }

    Ok(())
}

/// Runs clear → download → combine → export for one translation. A failed
/// book stops further downloads; whatever was fetched is still exported.
pub fn generate_translation<S: PassageSource>(
    translation: &Translation,
    layout: &TranslationLayout,
    fetcher: &BookFetcher<'_, S>,
    options: &FetchOptions,
    mut progress: Progress,
) -> Result<(TranslationReport, Progress)> {
    let started = Utc::now();

    let removed = clear_directory(&layout.books_dir)?;
    info!(
        translation = translation.id,
        stage = Stage::ClearOldFiles.as_str(),
        removed,
        "cleared previous book files"
    );

    let mut download = DownloadSummary {
        provider: Some(ProviderSettings {
            base_url: options.base_url.clone(),
            max_chapters: options.max_chapters,
        }),
        books_requested: BOOKS.len(),
        ..DownloadSummary::default()
    };

    for (index, book) in BOOKS.iter().enumerate() {
        progress = progress.advance();
        if !fetcher.download_book(translation, book, &layout.books_dir) {
            download.failed_book = Some(book.to_string());
            break;
        }
        download.books_downloaded += 1;

        info!(
            translation = translation.id,
            stage = Stage::Downloading.as_str(),
            book,
            position = %format!("{}/{}", index + 1, BOOKS.len()),
            overall = %format!("{}/{}", progress.completed, progress.total),
            percent = progress.percent(),
            "downloaded book"
        );
    }

    match &download.failed_book {
        Some(book) => warn!(
            translation = translation.id,
            stage = Stage::Aborted.as_str(),
            book = %book,
            downloaded = download.books_downloaded,
            "book failed to download; exporting partial translation"
        ),
        None => info!(translation = translation.id, "download complete"),
    }

    let report = combine_and_export(translation, layout, started, download)?;
    Ok((report, progress))
}

/// Merges the book files already on disk, writes the JSON and SQL exports and
/// the run manifest.
pub fn combine_and_export(
    translation: &Translation,
    layout: &TranslationLayout,
    started: DateTime<Utc>,
    download: DownloadSummary,
) -> Result<TranslationReport> {
    ensure_directory(&layout.translation_dir)?;

    let combined = combine_folder(&layout.books_dir)?;
    info!(
        translation = translation.id,
        stage = Stage::Combining.as_str(),
        files = combined.files_merged,
        path = %layout.json_path.display(),
        "books combined"
    );

    export_json(&combined.document, &layout.json_path)?;
    let sql_stats = export_sql(&layout.json_path, &layout.sql_path, translation.id)?;
    info!(
        translation = translation.id,
        stage = Stage::Exporting.as_str(),
        inserts = sql_stats.insert_statements,
        rows = sql_stats.rows,
        path = %layout.sql_path.display(),
        "sql script written"
    );

    let report = TranslationReport {
        translation: translation.id.to_string(),
        books_downloaded: download.books_downloaded,
        failed_book: download.failed_book.clone(),
        books_merged: combined.document.books.len(),
        chapters: combined.document.chapter_count(),
        verses: combined.document.verse_count(),
        insert_statements: sql_stats.insert_statements,
    };

    let manifest = build_manifest(layout, started, &download, &report)?;
    write_json_pretty(&layout.manifest_path, &manifest)?;
    info!(
        translation = translation.id,
        stage = Stage::Done.as_str(),
        status = %manifest.status,
        path = %layout.manifest_path.display(),
        "wrote run manifest"
    );

    Ok(report)
}

fn build_manifest(
    layout: &TranslationLayout,
    started: DateTime<Utc>,
    download: &DownloadSummary,
    report: &TranslationReport,
) -> Result<GenerateRunManifest> {
    let mut artifacts = Vec::new();
    for path in [&layout.json_path, &layout.sql_path] {
        artifacts.push(ArtifactHash {
            path: path.display().to_string(),
            sha256: sha256_file(path)?,
        });
    }

    // Without provider settings nothing was downloaded by this tool; the
    // book files were only merged.
    let status = match (&download.provider, report.is_complete()) {
        (_, false) => "partial",
        (None, true) => "combined",
        (Some(_), true) => "completed",
    };

    Ok(GenerateRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id: format!("run-{}", utc_compact_string(started)),
        translation: report.translation.clone(),
        status: status.to_string(),
        started_at: started.to_rfc3339_opts(SecondsFormat::Secs, true),
        updated_at: now_utc_string(),
        failed_book: report.failed_book.clone(),
        provider: download.provider.clone(),
        paths: RunPaths {
            translation_dir: layout.translation_dir.display().to_string(),
            books_dir: layout.books_dir.display().to_string(),
            json_path: layout.json_path.display().to_string(),
            sql_path: layout.sql_path.display().to_string(),
        },
        counts: RunCounts {
            books_requested: download.books_requested,
            books_downloaded: download.books_downloaded,
            books_merged: report.books_merged,
            chapters: report.chapters,
            verses: report.verses,
            insert_statements: report.insert_statements,
        },
        artifacts,
    })
}

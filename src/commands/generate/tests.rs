use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::bail;
use rusqlite::Connection;

use super::*;
use crate::commands::combine::combine_translation;
use crate::commands::fetch::DEFAULT_MAX_CHAPTERS;
use crate::model::BibleDocument;

/// Serves one verse per book and fails on `fail_on`.
struct ScriptedSource {
    fail_on: Option<&'static str>,
    requested: RefCell<Vec<String>>,
}

impl ScriptedSource {
    fn new(fail_on: Option<&'static str>) -> Self {
        Self {
            fail_on,
            requested: RefCell::new(Vec::new()),
        }
    }
}

impl PassageSource for ScriptedSource {
    fn fetch_passage(
        &self,
        _translation: &str,
        book: &str,
        _last_chapter: u32,
    ) -> Result<String> {
        self.requested.borrow_mut().push(book.to_string());
        if self.fail_on == Some(book) {
            bail!("service unavailable");
        }
        Ok(format!(
            r#"<span class="text Bk-1-1">{book}'s  first
verse</span><span class="text Bk-1-2">and the second</span>"#
        ))
    }
}

fn options() -> FetchOptions {
    FetchOptions {
        base_url: "http://localhost".to_string(),
        max_chapters: DEFAULT_MAX_CHAPTERS,
        timeout: Duration::from_secs(1),
        user_agent: "test".to_string(),
    }
}

fn run_translation(
    root: &Path,
    id: &str,
    source: &ScriptedSource,
    progress: Progress,
) -> (TranslationReport, Progress, TranslationLayout) {
    let translation = catalog::resolve(id).unwrap();
    let layout = TranslationLayout::new(root, translation.id);
    let fetcher = BookFetcher::new(source, DEFAULT_MAX_CHAPTERS).unwrap();
    let (report, progress) =
        generate_translation(translation, &layout, &fetcher, &options(), progress).unwrap();
    (report, progress, layout)
}

fn read_document(path: &Path) -> BibleDocument {
    BibleDocument::from_json_slice(&fs::read(path).unwrap()).unwrap()
}

fn read_manifest(path: &Path) -> GenerateRunManifest {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn full_run_exports_every_book_in_canonical_order() {
    let scratch = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new(None);

    let (report, progress, layout) =
        run_translation(scratch.path(), "esv", &source, Progress::new(BOOKS.len()));

    assert!(report.is_complete());
    assert_eq!(report.books_downloaded, 66);
    assert_eq!(report.books_merged, 66);
    assert_eq!(report.verses, 132);
    assert_eq!(progress.completed, 66);
    assert_eq!(progress.percent(), 100);

    let document = read_document(&layout.json_path);
    let names = document
        .books
        .iter()
        .map(|book| book.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, BOOKS.to_vec());
    assert_eq!(
        document.books[0].chapters[0].verses[0].text,
        "Genesis''s first verse"
    );

    let script = fs::read_to_string(&layout.sql_path).unwrap();
    assert!(script.starts_with("CREATE TABLE esv("));
    assert_eq!(script.matches("INSERT INTO esv").count(), 66);
    assert!(script.contains("(66,'Revelation',1,2,'and the second');\n"));

    let manifest = read_manifest(&layout.manifest_path);
    assert_eq!(manifest.status, "completed");
    assert_eq!(manifest.counts.books_downloaded, 66);
    assert_eq!(manifest.artifacts.len(), 2);
    assert_eq!(
        manifest.provider.map(|provider| provider.max_chapters),
        Some(DEFAULT_MAX_CHAPTERS)
    );
}

#[test]
fn first_failure_stops_downloads_but_still_exports() {
    let scratch = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new(Some("Leviticus"));

    let (report, progress, layout) =
        run_translation(scratch.path(), "KJV", &source, Progress::new(BOOKS.len()));

    assert_eq!(report.failed_book.as_deref(), Some("Leviticus"));
    assert_eq!(report.books_downloaded, 2);
    assert_eq!(source.requested.borrow().len(), 3);
    assert_eq!(progress.completed, 3);

    let document = read_document(&layout.json_path);
    assert_eq!(document.books.len(), 2);

    let connection = Connection::open_in_memory().unwrap();
    connection
        .execute_batch(&fs::read_to_string(&layout.sql_path).unwrap())
        .unwrap();
    let rows: i64 = connection
        .query_row("SELECT COUNT(*) FROM kjv", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 4);

    let manifest = read_manifest(&layout.manifest_path);
    assert_eq!(manifest.status, "partial");
    assert_eq!(manifest.failed_book.as_deref(), Some("Leviticus"));
}

#[test]
fn zero_downloaded_books_yield_header_only_sql() {
    let scratch = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new(Some("Genesis"));

    let (report, _, layout) =
        run_translation(scratch.path(), "NIV", &source, Progress::new(BOOKS.len()));

    assert_eq!(report.books_downloaded, 0);
    assert_eq!(report.books_merged, 0);

    let script = fs::read_to_string(&layout.sql_path).unwrap();
    assert!(script.starts_with("CREATE TABLE niv("));
    assert!(!script.contains("INSERT"));
    assert_eq!(fs::read_to_string(&layout.json_path).unwrap(), "{}\n");
}

#[test]
fn stale_book_files_are_cleared_before_download() {
    let scratch = tempfile::tempdir().unwrap();
    let layout = TranslationLayout::new(scratch.path(), "ESV");
    fs::create_dir_all(&layout.books_dir).unwrap();
    fs::write(layout.books_dir.join("Stale.json"), "{ not json").unwrap();

    let source = ScriptedSource::new(Some("Exodus"));
    let (report, _, layout) =
        run_translation(scratch.path(), "ESV", &source, Progress::new(BOOKS.len()));

    assert_eq!(report.books_merged, 1);
    assert!(!layout.books_dir.join("Stale.json").exists());
    assert!(layout.books_dir.join("Genesis.json").exists());
}

#[test]
fn combining_twice_is_byte_identical() {
    let scratch = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new(Some("Joshua"));
    let (_, _, layout) =
        run_translation(scratch.path(), "ESV", &source, Progress::new(BOOKS.len()));

    let first_json = fs::read(&layout.json_path).unwrap();
    let first_sql = fs::read(&layout.sql_path).unwrap();

    let translation = catalog::resolve("ESV").unwrap();
    combine_and_export(translation, &layout, Utc::now(), DownloadSummary::default()).unwrap();

    assert_eq!(fs::read(&layout.json_path).unwrap(), first_json);
    assert_eq!(fs::read(&layout.sql_path).unwrap(), first_sql);
}

#[test]
fn recombining_a_partial_download_keeps_it_partial() {
    let scratch = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new(Some("Leviticus"));
    let (_, _, layout) =
        run_translation(scratch.path(), "ESV", &source, Progress::new(BOOKS.len()));

    let translation = catalog::resolve("ESV").unwrap();
    let report = combine_translation(translation, &layout).unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.books_downloaded, 2);

    let manifest = read_manifest(&layout.manifest_path);
    assert_eq!(manifest.status, "partial");
    assert_eq!(manifest.failed_book.as_deref(), Some("Leviticus"));
    assert_eq!(manifest.counts.books_requested, 66);
    assert_eq!(manifest.counts.books_downloaded, 2);
    assert_eq!(manifest.counts.books_merged, 2);
    assert_eq!(
        manifest.provider.map(|provider| provider.base_url),
        Some("http://localhost".to_string())
    );
}

#[test]
fn combining_without_a_previous_manifest_starts_fresh() {
    let scratch = tempfile::tempdir().unwrap();
    let layout = TranslationLayout::new(scratch.path(), "ESV");
    fs::create_dir_all(&layout.books_dir).unwrap();
    fs::write(
        layout.books_dir.join("Jude.json"),
        r#"{"Jude": {"1": {"1": "Jude, a servant"}}}"#,
    )
    .unwrap();

    let translation = catalog::resolve("ESV").unwrap();
    let report = combine_translation(translation, &layout).unwrap();
    assert_eq!(report.books_merged, 1);

    let manifest = read_manifest(&layout.manifest_path);
    assert_eq!(manifest.status, "combined");
    assert!(manifest.provider.is_none());
    assert_eq!(manifest.counts.books_downloaded, 0);
}

#[test]
fn progress_is_threaded_across_translations() {
    let scratch = tempfile::tempdir().unwrap();
    let complete = ScriptedSource::new(None);
    let failing = ScriptedSource::new(Some("Numbers"));

    let progress = Progress::new(2 * BOOKS.len());
    let (_, progress, _) = run_translation(scratch.path(), "ASV", &complete, progress);
    assert_eq!(progress.completed, 66);
    assert_eq!(progress.percent(), 50);

    let (_, progress, _) = run_translation(scratch.path(), "WEB", &failing, progress);
    assert_eq!(progress.completed, 70);
    assert_eq!(progress.total, 132);
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::catalog;
use crate::cli::StatusArgs;
use crate::commands::export::table_name;
use crate::layout::TranslationLayout;
use crate::model::GenerateRunManifest;

fn count_book_files(folder: &Path) -> Result<usize> {
    let entries =
        fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))?;

    let mut count = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", folder.display()))?;
        if entry.path().extension().is_some_and(|ext| ext == "json") {
            count += 1;
        }
    }

    Ok(count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlScriptSummary {
    pub rows: i64,
    pub books: i64,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let translation = catalog::resolve(&args.translation)?;
    let layout = TranslationLayout::new(&args.output_root, translation.id);

    info!(
        translation = translation.id,
        language = translation.language,
        dir = %layout.translation_dir.display(),
        "status requested"
    );

    if layout.books_dir.exists() {
        let book_files = count_book_files(&layout.books_dir)?;
        info!(path = %layout.books_dir.display(), book_files, "book files present");
    } else {
        warn!(path = %layout.books_dir.display(), "book folder missing");
    }

    if layout.manifest_path.exists() {
        let raw = fs::read(&layout.manifest_path)
            .with_context(|| format!("failed to read {}", layout.manifest_path.display()))?;
        let manifest: GenerateRunManifest = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", layout.manifest_path.display()))?;

        info!(
            run_id = %manifest.run_id,
            status = %manifest.status,
            started_at = %manifest.started_at,
            updated_at = %manifest.updated_at,
            failed_book = %manifest.failed_book.unwrap_or_default(),
            books_downloaded = manifest.counts.books_downloaded,
            books_merged = manifest.counts.books_merged,
            verses = manifest.counts.verses,
            "loaded run manifest"
        );
    } else {
        warn!(path = %layout.manifest_path.display(), "run manifest missing");
    }

    if layout.json_path.exists() {
        info!(path = %layout.json_path.display(), "merged json present");
    } else {
        warn!(path = %layout.json_path.display(), "merged json missing");
    }

    if layout.sql_path.exists() {
        let summary = summarize_sql_script(&layout.sql_path, translation.id)?;
        info!(
            path = %layout.sql_path.display(),
            rows = summary.rows,
            books = summary.books,
            "sql script loads cleanly"
        );
    } else {
        warn!(path = %layout.sql_path.display(), "sql script missing");
    }

    Ok(())
}

/// Executes the script against an in-memory database and counts what it
/// inserted.
pub fn summarize_sql_script(path: &Path, translation: &str) -> Result<SqlScriptSummary> {
    let script =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let connection =
        Connection::open_in_memory().context("failed to open in-memory sqlite database")?;
    connection
        .execute_batch(&script)
        .with_context(|| format!("failed to execute {}", path.display()))?;

    let table = table_name(translation);
    let rows = query_count(&connection, &format!("SELECT COUNT(*) FROM {table}"))?;
    let books = query_count(
        &connection,
        &format!("SELECT COUNT(DISTINCT book_id) FROM {table}"),
    )?;

    Ok(SqlScriptSummary { rows, books })
}

fn query_count(conn: &Connection, sql: &str) -> Result<i64> {
    let count = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

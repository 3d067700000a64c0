use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::books;
use crate::model::BibleDocument;
use crate::util::write_json_indented;

pub const SQL_COLUMNS: &str = "book_id, book, chapter, verse, text";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlExportStats {
    pub insert_statements: usize,
    pub rows: usize,
}

pub fn export_json(document: &BibleDocument, path: &Path) -> Result<()> {
    write_json_indented(path, document)
}

/// Re-reads the merged JSON at `json_path` and writes the SQL script.
pub fn export_sql(json_path: &Path, sql_path: &Path, translation: &str) -> Result<SqlExportStats> {
    let raw =
        fs::read(json_path).with_context(|| format!("failed to read {}", json_path.display()))?;
    let document = BibleDocument::from_json_slice(&raw)
        .with_context(|| format!("failed to parse {}", json_path.display()))?;

    let (script, stats) = render_sql(&document, translation)?;
    fs::write(sql_path, script)
        .with_context(|| format!("failed to write {}", sql_path.display()))?;

    Ok(stats)
}

pub fn table_name(translation: &str) -> String {
    translation.to_lowercase()
}

pub fn create_table_statement(table: &str) -> String {
    format!(
        "CREATE TABLE {table}(book_id int not null, book varchar(255) not null, \
         chapter int not null, verse int not null, text varchar(1000) not null, \
         primary key (book_id, chapter, verse));\n"
    )
}

/// One `CREATE TABLE` followed by an `INSERT` block per chapter, in stored
/// order. Verse text is written as-is; it is already quote-escaped.
pub fn render_sql(document: &BibleDocument, translation: &str) -> Result<(String, SqlExportStats)> {
    let table = table_name(translation);
    let mut script = create_table_statement(&table);
    script.push('\n');

    let mut stats = SqlExportStats::default();
    for book in &document.books {
        let book_id = books::book_id(&book.name)
            .with_context(|| format!("'{}' is not a canonical book", book.name))?;

        for chapter in &book.chapters {
            if chapter.verses.is_empty() {
                continue;
            }
            let chapter_number = chapter.number.trim().parse::<u32>().with_context(|| {
                format!("{} has non-numeric chapter '{}'", book.name, chapter.number)
            })?;

            writeln!(script, "INSERT INTO {table}({SQL_COLUMNS}) VALUES")?;
            stats.insert_statements += 1;

            let last = chapter.verses.len() - 1;
            for (index, verse) in chapter.verses.iter().enumerate() {
                let verse_number = verse.number.trim().parse::<u32>().with_context(|| {
                    format!(
                        "{} {} has non-numeric verse '{}'",
                        book.name, chapter.number, verse.number
                    )
                })?;
                let terminator = if index == last { ';' } else { ',' };
                writeln!(
                    script,
                    "({book_id},'{}',{chapter_number},{verse_number},'{}'){terminator}",
                    book.name, verse.text
                )?;
                stats.rows += 1;
            }
        }
    }

    Ok((script, stats))
}

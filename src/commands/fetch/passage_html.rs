use anyhow::{Context, Result};
use regex::{Captures, Regex};

use crate::model::{Chapter, Verse};

/// Pulls verse text out of a printable passage page.
///
/// Verses are `<span class="text Gen-1-1">` elements; one verse may be split
/// over several spans (poetry lines) and a span may nest further spans
/// (small caps, words of Jesus). Headings, verse numbers, chapter numbers and
/// footnote markers are dropped.
pub struct PassageExtractor {
    heading: Regex,
    verse_open: Regex,
    span_tag: Regex,
    sup: Regex,
    chapter_number: Regex,
    tag: Regex,
    entity: Regex,
    whitespace: Regex,
}

impl PassageExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            heading: Regex::new(r"(?is)<h[1-6]\b[^>]*>.*?</h[1-6]>")
                .context("failed to compile heading regex")?,
            verse_open: Regex::new(
                r#"(?i)<span\b[^>]*\bclass="text [A-Za-z0-9]+-(\d+)-(\d+)[^"]*"[^>]*>"#,
            )
            .context("failed to compile verse span regex")?,
            span_tag: Regex::new(r"(?i)<(/?)span\b[^>]*>").context("failed to compile span regex")?,
            sup: Regex::new(r"(?is)<sup\b[^>]*>.*?</sup>").context("failed to compile sup regex")?,
            chapter_number: Regex::new(r#"(?is)<span\b[^>]*class="chapternum"[^>]*>.*?</span>"#)
                .context("failed to compile chapter number regex")?,
            tag: Regex::new(r"<[^>]*>").context("failed to compile tag regex")?,
            entity: Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);")
                .context("failed to compile entity regex")?,
            whitespace: Regex::new(r"\s+").context("failed to compile whitespace regex")?,
        })
    }

    /// Chapters and verses in first-seen order. Empty when the page carries no
    /// verse spans, e.g. an unknown translation or passage.
    pub fn extract(&self, html: &str) -> Vec<Chapter> {
        let html = self.heading.replace_all(html, "");
        let mut chapters: Vec<Chapter> = Vec::new();

        for captures in self.verse_open.captures_iter(&html) {
            let (Some(open), Some(chapter), Some(verse)) =
                (captures.get(0), captures.get(1), captures.get(2))
            else {
                continue;
            };

            let body = self.balanced_span_body(&html, open.end());
            let text = self.clean_fragment(body);
            if text.is_empty() {
                continue;
            }

            push_fragment(&mut chapters, chapter.as_str(), verse.as_str(), text);
        }

        chapters
    }

    fn balanced_span_body<'h>(&self, html: &'h str, start: usize) -> &'h str {
        let mut depth = 1_usize;
        for tag in self.span_tag.captures_iter(&html[start..]) {
            let closing = tag.get(1).is_some_and(|slash| !slash.as_str().is_empty());
            if closing {
                depth -= 1;
                if depth == 0 {
                    let end = tag.get(0).map_or(html.len() - start, |m| m.start());
                    return &html[start..start + end];
                }
            } else {
                depth += 1;
            }
        }
        &html[start..]
    }

    fn clean_fragment(&self, fragment: &str) -> String {
        let text = self.sup.replace_all(fragment, "");
        let text = self.chapter_number.replace_all(&text, "");
        let text = self.tag.replace_all(&text, "");
        let text = self.entity.replace_all(&text, decode_entity);
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

fn push_fragment(chapters: &mut Vec<Chapter>, chapter: &str, verse: &str, text: String) {
    let index = match chapters.iter().position(|existing| existing.number == chapter) {
        Some(index) => index,
        None => {
            chapters.push(Chapter {
                number: chapter.to_string(),
                verses: Vec::new(),
            });
            chapters.len() - 1
        }
    };

    let verses = &mut chapters[index].verses;
    match verses.iter_mut().find(|existing| existing.number == verse) {
        Some(existing) => {
            existing.text.push(' ');
            existing.text.push_str(&text);
        }
        None => verses.push(Verse {
            number: verse.to_string(),
            text,
        }),
    }
}

fn decode_entity(captures: &Captures<'_>) -> String {
    let raw = &captures[0];
    let name = &captures[1];

    let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(decimal) = name.strip_prefix('#') {
        decimal.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        match name {
            "nbsp" => Some(' '),
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "rsquo" => Some('\u{2019}'),
            "lsquo" => Some('\u{2018}'),
            "rdquo" => Some('\u{201d}'),
            "ldquo" => Some('\u{201c}'),
            "mdash" => Some('\u{2014}'),
            "ndash" => Some('\u{2013}'),
            _ => None,
        }
    };

    decoded.map_or_else(|| raw.to_string(), String::from)
}

//! Format-specific text extraction.
//!
//! Every loader is synchronous and file-based; callers run it on a
//! blocking thread. A loader returns one or more [`LoadedDocument`]s
//! (CSV yields one per row) which are split into chunks afterwards.

use std::io::{Cursor, Read};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::RagError;
use crate::types::FileType;

/// Raw text produced by a loader plus loader-specific metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl LoadedDocument {
    fn text(content: String) -> Self {
        Self { content, metadata: Map::new() }
    }
}

/// Parse the file at `path` according to `file_type`.
pub fn load_file(path: &Path, file_type: FileType) -> Result<Vec<LoadedDocument>, RagError> {
    let bytes = std::fs::read(path)?;
    load_bytes(&bytes, file_type)
}

/// Parse an in-memory file according to `file_type`.
pub fn load_bytes(bytes: &[u8], file_type: FileType) -> Result<Vec<LoadedDocument>, RagError> {
    let documents = match file_type {
        FileType::Pdf => vec![LoadedDocument::text(parse_pdf(bytes)?)],
        FileType::Docx => vec![LoadedDocument::text(parse_docx(bytes)?)],
        FileType::Doc => vec![LoadedDocument::text(parse_legacy_doc(bytes)?)],
        FileType::Txt | FileType::Md => {
            vec![LoadedDocument::text(String::from_utf8_lossy(bytes).into_owned())]
        }
        FileType::Csv => parse_csv(bytes)?,
        FileType::Pptx => vec![LoadedDocument::text(parse_pptx(bytes)?)],
    };
    Ok(documents)
}

fn parse_pdf(bytes: &[u8]) -> Result<String, RagError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| RagError::Parse {
        file_type: "pdf".into(),
        message: e.to_string(),
    })?;
    if text.trim().is_empty() {
        return Err(RagError::Parse {
            file_type: "pdf".into(),
            message: "no extractable text (scanned document?)".into(),
        });
    }
    Ok(text)
}

fn parse_docx(bytes: &[u8]) -> Result<String, RagError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    let text = extract_ooxml_text(&xml, "w");
    if text.is_empty() {
        return Err(RagError::Parse {
            file_type: "docx".into(),
            message: "document contains no text".into(),
        });
    }
    Ok(text)
}

/// Word 97-2003 files: many `.doc` uploads are really OOXML, so try that
/// first, then fall back to pulling printable runs out of the binary.
fn parse_legacy_doc(bytes: &[u8]) -> Result<String, RagError> {
    if let Ok(text) = parse_docx(bytes) {
        return Ok(text);
    }

    let utf16 = printable_utf16_runs(bytes, 4);
    let ascii = printable_ascii_runs(bytes, 4);
    let text = if utf16.chars().count() >= ascii.chars().count() { utf16 } else { ascii };

    if text.trim().is_empty() {
        return Err(RagError::Parse {
            file_type: "doc".into(),
            message: "no readable text found".into(),
        });
    }
    Ok(text)
}

fn parse_pptx(bytes: &[u8]) -> Result<String, RagError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut slides: Vec<(usize, String)> = Vec::new();

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(e) => e,
            Err(_) => continue,
        };
        let name = entry.name().to_owned();
        // ppt/slides/slide1.xml, slide2.xml, ...
        let Some(number) = name
            .strip_prefix("ppt/slides/slide")
            .and_then(|rest| rest.strip_suffix(".xml"))
            .and_then(|n| n.parse::<usize>().ok())
        else {
            continue;
        };

        let mut xml = String::new();
        if entry.read_to_string(&mut xml).is_ok() {
            let text = extract_ooxml_text(&xml, "a");
            if !text.is_empty() {
                slides.push((number, text));
            }
        }
    }

    if slides.is_empty() {
        return Err(RagError::Parse {
            file_type: "pptx".into(),
            message: "presentation contains no text".into(),
        });
    }
    slides.sort_by_key(|(number, _)| *number);

    Ok(slides
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join("\n\n"))
}

/// One document per data row, rendered as `header: value` lines.
fn parse_csv(bytes: &[u8]) -> Result<Vec<LoadedDocument>, RagError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut documents = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let content = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{header}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        if content.trim().is_empty() {
            continue;
        }
        let mut metadata = Map::new();
        metadata.insert("line".into(), Value::from(row + 1));
        documents.push(LoadedDocument { content, metadata });
    }
    Ok(documents)
}

/// Collect the text runs (`<{ns}:t>`) of each paragraph (`<{ns}:p>`),
/// one paragraph per line. `ns` is `w` for Word and `a` for DrawingML.
fn extract_ooxml_text(xml: &str, ns: &str) -> String {
    let para_open = format!("<{ns}:p");
    let para_close = format!("</{ns}:p>");
    let run_open = format!("<{ns}:t");
    let run_close = format!("</{ns}:t>");

    let mut lines: Vec<String> = Vec::new();
    let mut pos = 0;

    while let Some(start) = find_tag(xml, pos, &para_open) {
        let end = xml[start..]
            .find(&para_close)
            .map(|e| start + e + para_close.len())
            .unwrap_or(xml.len());
        let paragraph = &xml[start..end];

        let mut text = String::new();
        let mut run_pos = 0;
        while let Some(run_start) = find_tag(paragraph, run_pos, &run_open) {
            let Some(tag_end) = paragraph[run_start..].find('>') else {
                break;
            };
            let content_start = run_start + tag_end + 1;
            // Self-closing `<w:t/>` carries no text.
            if paragraph[..content_start].ends_with("/>") {
                run_pos = content_start;
                continue;
            }
            match paragraph[content_start..].find(&run_close) {
                Some(len) => {
                    text.push_str(&decode_entities(&paragraph[content_start..content_start + len]));
                    run_pos = content_start + len + run_close.len();
                }
                None => break,
            }
        }

        if !text.trim().is_empty() {
            lines.push(text);
        }
        pos = end;
    }

    lines.join("\n")
}

/// Find `tag` at or after `from`, requiring the next byte to end the tag
/// name (so `<w:p` does not match `<w:pPr`).
fn find_tag(haystack: &str, from: usize, tag: &str) -> Option<usize> {
    let mut cursor = from;
    while let Some(offset) = haystack.get(cursor..)?.find(tag) {
        let at = cursor + offset;
        match haystack.as_bytes().get(at + tag.len()) {
            Some(b'>') | Some(b' ') | Some(b'/') => return Some(at),
            _ => cursor = at + tag.len(),
        }
    }
    None
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn is_printable(c: char) -> bool {
    !c.is_control() || c == '\t'
}

fn printable_utf16_runs(bytes: &[u8], min_len: usize) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    let mut runs = Vec::new();
    let mut current = String::new();
    for decoded in char::decode_utf16(units) {
        match decoded {
            Ok(c) if is_printable(c) && (c.is_ascii() || c.is_alphanumeric() || c.is_whitespace()) => {
                current.push(c)
            }
            _ => flush_run(&mut runs, &mut current, min_len),
        }
    }
    flush_run(&mut runs, &mut current, min_len);
    runs.join("\n")
}

fn printable_ascii_runs(bytes: &[u8], min_len: usize) -> String {
    let mut runs = Vec::new();
    let mut current = String::new();
    for &b in bytes {
        if b == b'\t' || (0x20..0x7f).contains(&b) {
            current.push(b as char);
        } else {
            flush_run(&mut runs, &mut current, min_len);
        }
    }
    flush_run(&mut runs, &mut current, min_len);
    runs.join("\n")
}

fn flush_run(runs: &mut Vec<String>, current: &mut String, min_len: usize) {
    let trimmed = current.trim();
    if trimmed.chars().filter(|c| c.is_alphanumeric()).count() >= min_len {
        runs.push(trimmed.to_owned());
    }
    current.clear();
}

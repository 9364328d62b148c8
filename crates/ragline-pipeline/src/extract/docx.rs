//! DOCX text, table, and core-property extraction

use docx_rs::{
    DocumentChild, ParagraphChild, RunChild, TableCellContent, TableChild, TableRowChild,
};
use std::io::Read;
use std::path::Path;

use super::ExtractedDocument;
use crate::error::{Error, Result};
use crate::types::DocumentInfo;

/// DOCX extractor.
///
/// Unlike PDF extraction there is no fallback chain: a file `docx-rs`
/// cannot read is an error, and the processor decides what to do with it.
pub struct DocxExtractor;

impl DocxExtractor {
    /// Extract paragraph text, table grids, and core properties
    pub fn extract(path: &Path) -> Result<ExtractedDocument> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let data = std::fs::read(path)?;

        let docx = docx_rs::read_docx(&data)
            .map_err(|e| Error::file_parse(&filename, e.to_string()))?;

        let mut text = String::new();
        let mut paragraph_count = 0usize;
        let mut table_count = 0usize;

        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(p) => {
                    let line = paragraph_text(p);
                    if !line.is_empty() {
                        text.push_str(&line);
                        text.push('\n');
                        paragraph_count += 1;
                    }
                }
                DocumentChild::Table(t) => {
                    table_count += 1;
                    for row in table_rows(t) {
                        text.push_str(&row.join("\t"));
                        text.push('\n');
                    }
                }
                _ => {}
            }
        }

        if text.trim().is_empty() {
            return Err(Error::file_parse(&filename, "document contains no text"));
        }

        let mut info = read_core_props(&data).unwrap_or_default();
        info.paragraph_count = Some(paragraph_count);
        info.table_count = Some(table_count);

        Ok(ExtractedDocument {
            text,
            page_count: 1,
            strategy: Some("docx-rs"),
            info,
            ..ExtractedDocument::default()
        })
    }
}

/// Concatenate the run text of a paragraph
fn paragraph_text(p: &docx_rs::Paragraph) -> String {
    let mut out = String::new();
    for child in &p.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(t) = run_child {
                    out.push_str(&t.text);
                }
            }
        }
    }
    out.trim().to_string()
}

/// Flatten a table into rows of cell strings
fn table_rows(t: &docx_rs::Table) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for row in &t.rows {
        let TableChild::TableRow(row) = row;
        let mut cells = Vec::new();
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell;
            let mut cell_text = String::new();
            for content in &cell.children {
                if let TableCellContent::Paragraph(p) = content {
                    let line = paragraph_text(p);
                    if !line.is_empty() {
                        if !cell_text.is_empty() {
                            cell_text.push(' ');
                        }
                        cell_text.push_str(&line);
                    }
                }
            }
            cells.push(cell_text);
        }
        rows.push(cells);
    }
    rows
}

/// Read author/title/subject/created/modified from `docProps/core.xml`.
///
/// Failures here are tolerated: a document without readable core
/// properties still extracts.
fn read_core_props(data: &[u8]) -> Option<DocumentInfo> {
    let cursor = std::io::Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor).ok()?;
    let mut xml = String::new();
    archive
        .by_name("docProps/core.xml")
        .ok()?
        .read_to_string(&mut xml)
        .ok()?;
    Some(parse_core_props(&xml))
}

/// Parse the core-properties XML body
fn parse_core_props(xml: &str) -> DocumentInfo {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut info = DocumentInfo::default();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                const FIELDS: [&[u8]; 5] =
                    [b"creator", b"title", b"subject", b"created", b"modified"];
                let name = e.local_name();
                let local = name.as_ref();
                current = if FIELDS.contains(&local) {
                    Some(String::from_utf8_lossy(local).to_string())
                } else {
                    None
                };
            }
            Ok(Event::Text(e)) => {
                if let (Some(field), Ok(value)) = (current.as_deref(), e.unescape()) {
                    let value = value.trim().to_string();
                    if value.is_empty() {
                        continue;
                    }
                    match field {
                        "creator" => info.author = Some(value),
                        "title" => info.title = Some(value),
                        "subject" => info.subject = Some(value),
                        "created" => info.created = Some(value),
                        "modified" => info.modified = Some(value),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};

    fn write_docx(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("report.docx");
        let file = std::fs::File::create(&path).unwrap();
        Docx::new()
            .add_paragraph(
                Paragraph::new().add_run(Run::new().add_text("Quarterly summary paragraph.")),
            )
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Second paragraph.")))
            .add_table(Table::new(vec![TableRow::new(vec![
                TableCell::new()
                    .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Region"))),
                TableCell::new()
                    .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Revenue"))),
            ])]))
            .build()
            .pack(file)
            .unwrap();
        path
    }

    #[test]
    fn extracts_paragraphs_and_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_docx(dir.path());

        let doc = DocxExtractor::extract(&path).unwrap();
        assert!(doc.text.contains("Quarterly summary paragraph."));
        assert!(doc.text.contains("Second paragraph."));
        assert!(doc.text.contains("Region\tRevenue"));
        assert_eq!(doc.info.paragraph_count, Some(2));
        assert_eq!(doc.info.table_count, Some(1));
        assert!(!doc.failed());
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();

        assert!(DocxExtractor::extract(&path).is_err());
    }

    #[test]
    fn parses_core_properties() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
            <cp:coreProperties
                xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
                xmlns:dc="http://purl.org/dc/elements/1.1/"
                xmlns:dcterms="http://purl.org/dc/terms/">
              <dc:title>Annual Report</dc:title>
              <dc:subject>Finance</dc:subject>
              <dc:creator>J. Author</dc:creator>
              <dcterms:created>2024-01-15T10:00:00Z</dcterms:created>
              <dcterms:modified>2024-02-01T09:30:00Z</dcterms:modified>
            </cp:coreProperties>"#;

        let info = parse_core_props(xml);
        assert_eq!(info.title.as_deref(), Some("Annual Report"));
        assert_eq!(info.subject.as_deref(), Some("Finance"));
        assert_eq!(info.author.as_deref(), Some("J. Author"));
        assert_eq!(info.created.as_deref(), Some("2024-01-15T10:00:00Z"));
        assert_eq!(info.modified.as_deref(), Some("2024-02-01T09:30:00Z"));
    }
}

//! DOCX container access: embedded media and body paragraphs.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::titles::TitleFilter;
use super::DocumentSource;

const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DOCUMENT_XML: &str = "word/document.xml";
const MEDIA_PREFIX: &str = "word/media/";

/// Flattens one `w:p` element the way Word shows it as plain text.
fn paragraph_text(paragraph: roxmltree::Node) -> String {
    let mut text = String::new();
    for node in paragraph.descendants().filter(|n| n.is_element()) {
        if node.tag_name().namespace() != Some(WORDML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "t" => text.push_str(node.text().unwrap_or_default()),
            "tab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// Text of every top-level body paragraph, in order. Paragraphs inside
/// tables are not included.
pub fn body_paragraphs(xml: &str) -> Result<Vec<String>> {
    let doc = roxmltree::Document::parse(xml).context("Failed to parse document.xml")?;
    let body = doc
        .descendants()
        .find(|n| n.has_tag_name((WORDML_NS, "body")))
        .ok_or_else(|| anyhow!("document.xml has no body"))?;

    Ok(body
        .children()
        .filter(|n| n.has_tag_name((WORDML_NS, "p")))
        .map(paragraph_text)
        .collect())
}

/// A .docx file held in memory.
pub struct DocxDocument {
    path: PathBuf,
    bytes: Vec<u8>,
    titles: TitleFilter,
}

impl DocxDocument {
    /// Reads the file and checks that it is a zip container.
    pub fn open(path: &Path, titles: TitleFilter) -> Result<Self> {
        let mut bytes = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .with_context(|| format!("Failed to read document {}", path.display()))?;

        let doc = Self {
            path: path.to_path_buf(),
            bytes,
            titles,
        };
        doc.archive()?;
        Ok(doc)
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<&[u8]>>> {
        ZipArchive::new(Cursor::new(self.bytes.as_slice()))
            .with_context(|| format!("{} is not a valid DOCX file", self.path.display()))
    }

    fn document_xml(&self) -> Result<String> {
        let mut archive = self.archive()?;
        let mut file = archive
            .by_name(DOCUMENT_XML)
            .with_context(|| format!("{} is missing {}", self.path.display(), DOCUMENT_XML))?;
        let mut xml = String::new();
        file.read_to_string(&mut xml)
            .context("Failed to read document.xml")?;
        Ok(xml)
    }

    pub fn paragraphs(&self) -> Result<Vec<String>> {
        body_paragraphs(&self.document_xml()?)
    }
}

impl DocumentSource for DocxDocument {
    fn titles(&self) -> Result<Vec<String>> {
        Ok(self.titles.select(self.paragraphs()?))
    }

    fn extract_images(&self, dest: &Path) -> Result<Vec<PathBuf>> {
        let mut archive = self.archive()?;
        let mut written = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).context("Failed to read DOCX entry")?;
            if entry.is_dir() {
                continue;
            }
            let Some(file_name) = entry
                .name()
                .strip_prefix(MEDIA_PREFIX)
                .and_then(|rest| rest.rsplit('/').next())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
            else {
                continue;
            };

            let out_path = dest.join(&file_name);
            let mut out = File::create(&out_path)
                .with_context(|| format!("Failed to create {}", out_path.display()))?;
            std::io::copy(&mut entry, &mut out)
                .with_context(|| format!("Failed to extract {}", file_name))?;
            written.push(out_path);
        }

        tracing::info!(
            count = written.len(),
            dest = %dest.display(),
            "Extracted embedded media"
        );

        Ok(written)
    }
}

/// Builds an in-memory DOCX for tests.
#[cfg(test)]
pub(crate) fn build_docx(paragraphs: &[&str], media: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut body = String::new();
    for p in paragraphs {
        body.push_str(&format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p));
    }
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
        WORDML_NS, body
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file(DOCUMENT_XML, options).unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    for (name, data) in media {
        writer.start_file(format!("{}{}", MEDIA_PREFIX, name), options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Writes a test DOCX to `dir` and returns its path.
#[cfg(test)]
pub(crate) fn write_docx(dir: &Path, paragraphs: &[&str], media: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join("deck.docx");
    std::fs::write(&path, build_docx(paragraphs, media)).unwrap();
    path
}

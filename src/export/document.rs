//! Docx rendering.
//!
//! A `.docx` is a zip of XML parts. The body, header and footer parts of the
//! template are Liquid templates once the word processor's run splitting has
//! been undone; every other part is copied through untouched.

use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::layout::remove_if_exists;
use super::transform::CardContext;
use crate::error::ExportError;

/// Markup between the two characters of an opening or closing delimiter.
static SPLIT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:<[^>]*>)+([{%#])").unwrap());
static SPLIT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([%}#])(?:<[^>]*>)+\}").unwrap());
static TAG_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}|\{#.*?#\}").unwrap());
static RUN_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)</w:t>.*?<w:t(?:\s[^>]*)?>").unwrap());

/// Elements a `{%p ... %}`-style tag replaces as a whole.
const ELEMENT_TAGS: [&str; 4] = ["tr", "tc", "p", "r"];

enum PartBody {
    Copy(Vec<u8>),
    Render(liquid::Template),
}

struct Part {
    name: String,
    compression: CompressionMethod,
    is_dir: bool,
    body: PartBody,
}

pub struct DocxTemplate {
    parts: Vec<Part>,
}

impl DocxTemplate {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        Self::from_bytes(&bytes)
            .with_context(|| format!("Invalid template {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExportError> {
        let parser = liquid::ParserBuilder::with_stdlib()
            .build()
            .map_err(|e| ExportError::Engine {
                stage: "parser setup",
                message: e.to_string(),
            })?;
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            let compression = file.compression();
            let is_dir = file.is_dir();
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| ExportError::Archive(e.into()))?;

            let body = if is_templated_part(&name) {
                let xml = String::from_utf8(data).map_err(|e| ExportError::Template {
                    part: name.clone(),
                    message: e.to_string(),
                })?;
                let template =
                    parser
                        .parse(&prepare_xml(&xml))
                        .map_err(|e| ExportError::Template {
                            part: name.clone(),
                            message: e.to_string(),
                        })?;
                PartBody::Render(template)
            } else {
                PartBody::Copy(data)
            };

            parts.push(Part {
                name,
                compression,
                is_dir,
                body,
            });
        }

        Ok(Self { parts })
    }

    /// Render every templated part with `context` and return the new docx bytes.
    pub fn render(&self, context: &CardContext) -> Result<Vec<u8>, ExportError> {
        let globals = context_object(context)?;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for part in &self.parts {
            let compression = match part.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = FileOptions::default().compression_method(compression);

            if part.is_dir {
                writer.add_directory(part.name.as_str(), options)?;
                continue;
            }

            writer.start_file(part.name.as_str(), options)?;
            let written = match &part.body {
                PartBody::Copy(data) => writer.write_all(data),
                PartBody::Render(template) => {
                    let xml = template
                        .render(&globals)
                        .map_err(|e| ExportError::Template {
                            part: part.name.clone(),
                            message: e.to_string(),
                        })?;
                    writer.write_all(xml.as_bytes())
                }
            };
            written.map_err(|e| ExportError::Archive(e.into()))?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn context_object<T: serde::Serialize>(context: &T) -> Result<liquid::Object, ExportError> {
    let stage = "card context";
    match liquid::model::to_value(context) {
        Ok(liquid::model::Value::Object(object)) => Ok(object),
        Ok(_) => Err(ExportError::Engine {
            stage,
            message: "not an object".into(),
        }),
        Err(e) => Err(ExportError::Engine {
            stage,
            message: e.to_string(),
        }),
    }
}

fn is_templated_part(name: &str) -> bool {
    name == "word/document.xml"
        || ((name.starts_with("word/header") || name.starts_with("word/footer"))
            && name.ends_with(".xml"))
}

/// Undo the run splitting a word processor applies inside template tags and
/// expand element-level tags, so the XML parses as a Liquid template.
pub fn prepare_xml(xml: &str) -> String {
    let xml = SPLIT_OPEN.replace_all(xml, "{$1");
    let xml = SPLIT_CLOSE.replace_all(&xml, "$1}");
    let mut xml = TAG_SPAN
        .replace_all(&xml, |caps: &Captures| {
            let tag = RUN_BREAK.replace_all(&caps[0], "");
            clean_tag(&tag)
        })
        .into_owned();
    for element in ELEMENT_TAGS {
        xml = collapse_element_tags(&xml, element);
    }
    xml
}

/// Restore characters the word processor escaped or typeset inside a tag.
fn clean_tag(tag: &str) -> String {
    tag.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#8216;", "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/// Replace each `<w:ELEM>` holding a `{%ELEM ... %}` tag with the bare
/// `{% ... %}` tag, so loops and conditions repeat whole paragraphs, rows,
/// cells or runs.
fn collapse_element_tags(xml: &str, element: &str) -> String {
    let marker = format!("{{%{element} ");
    let open_attrs = format!("<w:{element} ");
    let open_bare = format!("<w:{element}>");
    let close = format!("</w:{element}>");

    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(tag_at) = rest.find(&marker) {
        let head = &rest[..tag_at];
        let body_start = tag_at + marker.len();
        let Some(tag_len) = rest[body_start..].find("%}") else {
            break;
        };
        let inner = &rest[body_start..body_start + tag_len];
        let after_tag = body_start + tag_len + 2;

        let start = head.rfind(&open_attrs).max(head.rfind(&open_bare));
        let end = rest[after_tag..].find(&close);
        match (start, end) {
            (Some(start), Some(end)) => {
                out.push_str(&head[..start]);
                out.push_str("{% ");
                out.push_str(inner);
                out.push_str("%}");
                rest = &rest[after_tag + end + close.len()..];
            }
            _ => {
                // Not inside such an element: keep it as a plain block tag.
                out.push_str(head);
                out.push_str("{% ");
                out.push_str(inner);
                out.push_str("%}");
                rest = &rest[after_tag..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Write a rendered document, replacing any previous export at `path`.
pub fn save_document(path: &Path, bytes: &[u8]) -> Result<()> {
    remove_if_exists(path)?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "document saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::{docx_part, docx_with_body};
    use crate::export::transform::{ChecklistContext, CommentContext};

    fn context() -> CardContext {
        CardContext {
            board: "Roadmap".into(),
            board_description: String::new(),
            title: "Fix &amp; ship".into(),
            list: "Doing".into(),
            labels: "Bug, P1".into(),
            start_date: String::new(),
            due_date: "01/02/2024 10:00".into(),
            due_complete: false,
            last_activity_date: String::new(),
            description: "Line".into(),
            short_id: 12,
            url: "https://trello.com/c/x".into(),
            closed: false,
            checklists: Vec::<ChecklistContext>::new(),
            actions: vec![
                CommentContext {
                    date: "02/02/2024 09:00".into(),
                    author: "Ada".into(),
                    text: "first".into(),
                },
                CommentContext {
                    date: "03/02/2024 09:00".into(),
                    author: "Bob".into(),
                    text: "second".into(),
                },
            ],
            attachments: Vec::new(),
        }
    }

    #[test]
    fn heals_tags_split_across_runs() {
        let xml = r#"<w:r><w:t>{{</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve"> title }}</w:t></w:r>"#;
        assert_eq!(prepare_xml(xml), "<w:r><w:t>{{ title }}</w:t></w:r>");
    }

    #[test]
    fn heals_split_delimiters() {
        let xml = "<w:t>{</w:t></w:r><w:r><w:t>{ title }</w:t></w:r><w:r><w:t>}</w:t>";
        assert_eq!(prepare_xml(xml), "<w:t>{{ title }}</w:t>");
    }

    #[test]
    fn restores_typeset_quotes_inside_tags() {
        let xml = "<w:t>{% if list == \u{201C}Done\u{201D} %}x{% endif %} “kept”</w:t>";
        assert_eq!(
            prepare_xml(xml),
            "<w:t>{% if list == \"Done\" %}x{% endif %} “kept”</w:t>"
        );
    }

    #[test]
    fn paragraph_tags_replace_their_paragraph() {
        let xml = concat!(
            r#"<w:p w:rsidR="1"><w:r><w:t>{%p for a in actions %}</w:t></w:r></w:p>"#,
            "<w:p><w:r><w:t>{{ a.author }}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{%p endfor %}</w:t></w:r></w:p>"
        );
        assert_eq!(
            prepare_xml(xml),
            "{% for a in actions %}<w:p><w:r><w:t>{{ a.author }}</w:t></w:r></w:p>{% endfor %}"
        );
    }

    #[test]
    fn row_tags_replace_their_table_row() {
        let xml = concat!(
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>{%tr for a in actions %}</w:t></w:r></w:p></w:tc></w:tr>",
            "<w:tr><w:tc><w:p><w:r><w:t>{{ a.text }}</w:t></w:r></w:p></w:tc></w:tr>",
            "<w:tr><w:tc><w:p><w:r><w:t>{%tr endfor %}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"
        );
        assert_eq!(
            prepare_xml(xml),
            "<w:tbl>{% for a in actions %}<w:tr><w:tc><w:p><w:r><w:t>{{ a.text }}</w:t></w:r></w:p></w:tc></w:tr>{% endfor %}</w:tbl>"
        );
    }

    #[test]
    fn renders_body_and_copies_other_parts() {
        let body = concat!(
            "<w:body><w:p><w:r><w:t>{{ title }} #{{ shortId }}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{%p for a in actions %}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{{ a.author }}: {{ a.text }}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{%p endfor %}</w:t></w:r></w:p></w:body>"
        );
        let template = DocxTemplate::from_bytes(&docx_with_body(body)).unwrap();

        let rendered = template.render(&context()).unwrap();

        let document = docx_part(&rendered, "word/document.xml");
        assert!(document.contains("Fix &amp; ship #12"));
        assert!(document.contains("<w:t>Ada: first</w:t>"));
        assert!(document.contains("<w:t>Bob: second</w:t>"));
        assert!(!document.contains("{%"));
        assert_eq!(
            docx_part(&rendered, "[Content_Types].xml"),
            docx_part(&docx_with_body(body), "[Content_Types].xml")
        );
    }

    #[test]
    fn broken_template_is_rejected_at_load() {
        let result = DocxTemplate::from_bytes(&docx_with_body("<w:t>{% for x in %}</w:t>"));
        assert!(matches!(result, Err(ExportError::Template { .. })));
    }

    #[test]
    fn non_object_context_names_the_failing_stage() {
        let err = context_object(&vec!["title"]).unwrap_err();
        assert!(matches!(err, ExportError::Engine { stage: "card context", .. }));
        assert!(!err.to_string().contains("''"));
    }

    #[test]
    fn non_zip_template_is_rejected() {
        let result = DocxTemplate::from_bytes(b"not a docx");
        assert!(matches!(result, Err(ExportError::Archive(_))));
    }

    #[test]
    fn save_replaces_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.docx");
        std::fs::write(&path, b"old").unwrap();

        save_document(&path, b"new").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}

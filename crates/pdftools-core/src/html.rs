//! HTML to PDF
//!
//! A small renderer: headings, paragraphs, line breaks, list
//! items and bold text. Styles, tables and images are ignored.

use lazy_static::lazy_static;
use regex::Regex;

use crate::command::{Artifact, ProcessOutput};
use crate::error::PdfToolsError;
use crate::layout::{Run, TextDocument, LETTER};

const MARGIN: f32 = 50.0;
const BODY_SIZE: f32 = 12.0;

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)[^>]*>").unwrap();
    static ref SCRIPT: Regex = Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap();
    static ref STYLE: Regex = Regex::new(r"(?is)<style\b.*?</style\s*>").unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
}

/// A block of text with one font size
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub size: f32,
    pub runs: Vec<Run>,
}

fn heading_size(tag: &str) -> Option<f32> {
    match tag {
        "h1" => Some(18.0),
        "h2" => Some(16.0),
        "h3" => Some(14.0),
        "h4" | "h5" | "h6" => Some(BODY_SIZE),
        _ => None,
    }
}

struct BlockBuilder {
    blocks: Vec<Block>,
    size: f32,
    runs: Vec<Run>,
    bold_depth: usize,
    heading: bool,
}

impl BlockBuilder {
    fn push_text(&mut self, raw: &str) {
        let decoded = html_escape::decode_html_entities(raw);
        let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return;
        }
        let leading = if raw.starts_with(char::is_whitespace) && !self.runs.is_empty() {
            " "
        } else {
            ""
        };
        let trailing = if raw.ends_with(char::is_whitespace) { " " } else { "" };
        self.runs.push(Run::new(
            format!("{}{}{}", leading, collapsed, trailing),
            self.heading || self.bold_depth > 0,
        ));
    }

    fn flush(&mut self) {
        if self.runs.iter().any(|r| !r.text.trim().is_empty()) {
            self.blocks.push(Block {
                size: self.size,
                runs: std::mem::take(&mut self.runs),
            });
        }
        self.runs.clear();
    }
}

/// Split HTML into blocks of styled text.
pub fn parse_blocks(html: &str) -> Vec<Block> {
    let cleaned = COMMENT.replace_all(html, "");
    let cleaned = SCRIPT.replace_all(&cleaned, "");
    let cleaned = STYLE.replace_all(&cleaned, "");

    let mut builder = BlockBuilder {
        blocks: Vec::new(),
        size: BODY_SIZE,
        runs: Vec::new(),
        bold_depth: 0,
        heading: false,
    };

    let mut last = 0;
    for caps in TAG.captures_iter(&cleaned) {
        let Some(whole) = caps.get(0) else { continue };
        builder.push_text(&cleaned[last..whole.start()]);
        last = whole.end();

        let closing = &caps[1] == "/";
        let tag = caps[2].to_ascii_lowercase();
        match tag.as_str() {
            "b" | "strong" => {
                if closing {
                    builder.bold_depth = builder.bold_depth.saturating_sub(1);
                } else {
                    builder.bold_depth += 1;
                }
            }
            "br" => builder.flush(),
            "p" | "div" | "li" | "tr" | "section" | "article" | "blockquote" | "ul" | "ol" => {
                builder.flush();
                if !closing && tag == "li" {
                    builder.runs.push(Run::new("- ", false));
                }
            }
            other => {
                if let Some(size) = heading_size(other) {
                    builder.flush();
                    if closing {
                        builder.size = BODY_SIZE;
                        builder.heading = false;
                    } else {
                        builder.size = size;
                        builder.heading = true;
                    }
                }
            }
        }
    }
    builder.push_text(&cleaned[last..]);
    builder.flush();
    builder.blocks
}

pub fn html_to_pdf(html: &str) -> Result<ProcessOutput, PdfToolsError> {
    let blocks = parse_blocks(html);
    if blocks.is_empty() {
        return Err(PdfToolsError::usage("No HTML content provided"));
    }

    let mut doc = TextDocument::new(LETTER, MARGIN);
    for block in &blocks {
        doc.paragraph(&block.runs, block.size);
        doc.skip(block.size * 0.4);
    }
    let bytes = doc.finish()?;

    Ok(ProcessOutput::single(Artifact::pdf("html-to-pdf", bytes)).with_notice(
        "Only basic HTML structure is rendered; CSS styles, tables and images are not converted",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::page_strings;
    use lopdf::Document;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_headings_and_bold() {
        let blocks = parse_blocks("<h1>Title</h1><p>Hello <b>big</b> world</p>");
        assert_eq!(
            blocks,
            vec![
                Block {
                    size: 18.0,
                    runs: vec![Run::new("Title", true)],
                },
                Block {
                    size: 12.0,
                    runs: vec![
                        Run::new("Hello ", false),
                        Run::new("big", true),
                        Run::new(" world", false),
                    ],
                },
            ]
        );
    }

    #[test]
    fn test_scripts_and_entities() {
        let blocks = parse_blocks("<script>alert(1)</script><p>Fish &amp; chips</p>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].runs[0].text, "Fish & chips");
    }

    #[test]
    fn test_html_to_pdf_renders_text() {
        let output = html_to_pdf("<h2>Report</h2><p>Body text</p>").unwrap();
        let doc = Document::load_mem(&output.artifacts[0].bytes).unwrap();
        let strings = page_strings(&doc, 1);
        assert!(strings.contains(&"Report".to_string()));
        assert!(strings.contains(&"Body text".to_string()));
    }

    #[test]
    fn test_empty_html_fails() {
        assert!(html_to_pdf("<div>   </div>").is_err());
    }
}

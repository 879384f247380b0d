//! Serializers for [`DiffDocument`]: HTML, Markdown and plain text.

use std::fmt::Write as _;
use std::path::Path;

use tracing::{debug, instrument};

use reglens_shared::{RegLensError, Result};

use crate::document::{DiffDocument, Paragraph, ParagraphKind, Run};

/// Output format, chosen from the target file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Html,
    Markdown,
    Text,
}

impl DocumentFormat {
    /// `.html`/`.htm` → HTML, `.md`/`.markdown` → Markdown, anything else → text.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("html" | "htm") => Self::Html,
            Some("md" | "markdown") => Self::Markdown,
            _ => Self::Text,
        }
    }

    pub fn render(&self, doc: &DiffDocument) -> String {
        match self {
            Self::Html => render_html(doc),
            Self::Markdown => render_markdown(doc),
            Self::Text => render_text(doc),
        }
    }
}

/// Render `doc` in the format implied by `path` and write it there.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_document(doc: &DiffDocument, path: &Path) -> Result<DocumentFormat> {
    let format = DocumentFormat::from_path(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RegLensError::io(parent, e))?;
    }
    let rendered = format.render(doc);
    std::fs::write(path, &rendered).map_err(|e| RegLensError::io(path, e))?;
    debug!(?format, bytes = rendered.len(), "wrote diff document");
    Ok(format)
}

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

pub fn render_text(doc: &DiffDocument) -> String {
    let mut out = String::new();
    for p in &doc.paragraphs {
        out.push_str(&p.text());
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

/// Markdown rendering. Consecutive diff lines share one fenced `diff` block
/// whose fence is longer than any backtick run inside it.
pub fn render_markdown(doc: &DiffDocument) -> String {
    let mut out = String::new();
    let paragraphs = &doc.paragraphs;
    let mut i = 0;

    while i < paragraphs.len() {
        let p = &paragraphs[i];
        match p.kind {
            ParagraphKind::Label => {
                let _ = writeln!(out, "**{}**\n", p.text());
            }
            ParagraphKind::Body => {
                let _ = writeln!(out, "{}\n", p.text());
            }
            ParagraphKind::Diff(_) => {
                let run_len = paragraphs[i..]
                    .iter()
                    .take_while(|q| matches!(q.kind, ParagraphKind::Diff(_)))
                    .count();
                let lines: Vec<String> = paragraphs[i..i + run_len].iter().map(Paragraph::text).collect();
                let fence = code_fence(&lines);
                let _ = writeln!(out, "{fence}diff");
                for line in &lines {
                    let _ = writeln!(out, "{line}");
                }
                let _ = writeln!(out, "{fence}");
                i += run_len;
                if i < paragraphs.len() {
                    out.push('\n');
                }
                continue;
            }
            ParagraphKind::Rule => out.push_str("---\n\n"),
        }
        i += 1;
    }
    out
}

fn code_fence(lines: &[String]) -> String {
    let longest = lines
        .iter()
        .flat_map(|line| line.split(|c: char| c != '`'))
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// Standalone HTML page with inline run styles.
pub fn render_html(doc: &DiffDocument) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Regulation changes</title>\n</head>\n<body>\n",
    );
    for p in &doc.paragraphs {
        out.push_str(&html_paragraph(p));
        out.push('\n');
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn html_paragraph(p: &Paragraph) -> String {
    let inner: String = p.runs.iter().map(html_run).collect();
    match p.kind {
        ParagraphKind::Label => format!("<p><strong>{inner}</strong></p>"),
        ParagraphKind::Body => format!("<p style=\"white-space: pre-wrap\">{inner}</p>"),
        ParagraphKind::Diff(_) => format!("<p style=\"margin: 0; font-family: monospace; white-space: pre\">{inner}</p>"),
        ParagraphKind::Rule => "<hr>".to_string(),
    }
}

fn html_run(run: &Run) -> String {
    let mut style = Vec::new();
    if let Some(color) = run.color {
        style.push(format!("color: {}", color.hex()));
    }
    if run.underline {
        style.push("text-decoration: underline".to_string());
    }
    let text = escape_html(&run.text);
    if style.is_empty() {
        text
    } else {
        format!("<span style=\"{}\">{text}</span>", style.join("; "))
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

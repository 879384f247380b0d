//! In-memory model of an annotated diff report.

use serde::Serialize;

use reglens_shared::{DiffLine, DiffTag, MergeResult};

/// Rule printed between pairs in a report.
pub const SEPARATOR_RULE: &str = "-----------------------------------";

/// RGB text color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 255, 0);

    /// `#rrggbb` form.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// A span of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub text: String,
    pub color: Option<Rgb>,
    pub underline: bool,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
            underline: false,
        }
    }

    /// The styled run for a diff line: colored and underlined when it changed.
    pub fn for_diff_line(line: &DiffLine) -> Self {
        let color = match line.tag {
            DiffTag::Removed => Some(Rgb::RED),
            DiffTag::Added => Some(Rgb::GREEN),
            DiffTag::Unchanged => None,
        };
        Self {
            text: line.marked(),
            color,
            underline: color.is_some(),
        }
    }
}

/// What a paragraph represents, so writers can pick a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphKind {
    /// Section label such as `Original Chunk:`.
    Label,
    /// Free text, possibly spanning several lines.
    Body,
    /// One line of an edit script.
    Diff(DiffTag),
    /// Horizontal separator.
    Rule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    pub kind: ParagraphKind,
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// Concatenated run text.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Ordered list of paragraphs, ready to hand to a writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffDocument {
    pub paragraphs: Vec<Paragraph>,
}

impl DiffDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn label(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(ParagraphKind::Label, Run::plain(text))
    }

    pub fn body(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(ParagraphKind::Body, Run::plain(text))
    }

    pub fn diff_line(&mut self, line: &DiffLine) -> &mut Self {
        self.push(ParagraphKind::Diff(line.tag), Run::for_diff_line(line))
    }

    pub fn rule(&mut self) -> &mut Self {
        self.push(ParagraphKind::Rule, Run::plain(SEPARATOR_RULE))
    }

    /// Append the report block for one merged pair.
    pub fn merge_result(&mut self, result: &MergeResult) -> &mut Self {
        self.label("Original Chunk:")
            .body(result.original.text.as_str())
            .label("Updated Chunk:")
            .body(result.updated.text.as_str())
            .label("Differences:");
        for line in &result.line_diff {
            self.diff_line(line);
        }
        self.rule()
    }

    fn push(&mut self, kind: ParagraphKind, run: Run) -> &mut Self {
        self.paragraphs.push(Paragraph {
            kind,
            runs: vec![run],
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reglens_shared::Chunk;

    #[test]
    fn diff_runs_are_colored_by_tag() {
        let removed = Run::for_diff_line(&DiffLine::new(DiffTag::Removed, "old"));
        assert_eq!(removed.text, "- old");
        assert_eq!(removed.color, Some(Rgb::RED));
        assert!(removed.underline);

        let added = Run::for_diff_line(&DiffLine::new(DiffTag::Added, "new"));
        assert_eq!(added.color.map(|c| c.hex()), Some("#00ff00".to_string()));

        let same = Run::for_diff_line(&DiffLine::new(DiffTag::Unchanged, "same"));
        assert_eq!(same.text, "  same");
        assert_eq!(same.color, None);
        assert!(!same.underline);
    }

    #[test]
    fn merge_result_layout() {
        let result = MergeResult {
            original: Chunk::new(0, "a"),
            updated: Chunk::new(0, "b"),
            line_diff: vec![
                DiffLine::new(DiffTag::Removed, "a"),
                DiffLine::new(DiffTag::Added, "b"),
            ],
            fallback: false,
        };
        let mut doc = DiffDocument::new();
        doc.merge_result(&result);

        let texts: Vec<String> = doc.paragraphs.iter().map(Paragraph::text).collect();
        assert_eq!(
            texts,
            vec![
                "Original Chunk:",
                "a",
                "Updated Chunk:",
                "b",
                "Differences:",
                "- a",
                "+ b",
                SEPARATOR_RULE,
            ]
        );
        assert_eq!(doc.paragraphs.last().map(|p| p.kind), Some(ParagraphKind::Rule));
    }
}

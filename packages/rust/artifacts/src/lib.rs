//! Diff rendering for merged regulation chunks.
//!
//! [`line_diff`] computes the edit script, [`DiffDocument`] holds the styled
//! report, and [`write_document`] serializes it by file extension.

pub mod diff;
pub mod document;
pub mod writer;

use std::path::Path;

use tracing::info;

use reglens_shared::{MergeResult, Result};

pub use diff::{change_counts, line_diff, reconstruct};
pub use document::{DiffDocument, Paragraph, ParagraphKind, Rgb, Run, SEPARATOR_RULE};
pub use writer::{DocumentFormat, render_html, render_markdown, render_text, write_document};

/// Builds diff reports from merge results.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffRenderer {
    include_unchanged: bool,
}

impl DiffRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report pairs whose text did not change.
    pub fn include_unchanged(mut self, include: bool) -> Self {
        self.include_unchanged = include;
        self
    }

    /// Lay out one block per reported pair, in the order given.
    pub fn report(&self, results: &[MergeResult]) -> DiffDocument {
        let mut doc = DiffDocument::new();
        for result in results
            .iter()
            .filter(|r| self.include_unchanged || r.changed())
        {
            doc.merge_result(result);
        }
        doc
    }

    /// Build the report and write it to `path`. Returns the number of pairs written.
    pub fn write(&self, results: &[MergeResult], path: &Path) -> Result<usize> {
        let doc = self.report(results);
        let pairs = doc
            .paragraphs
            .iter()
            .filter(|p| p.kind == ParagraphKind::Rule)
            .count();
        let format = write_document(&doc, path)?;
        info!(path = %path.display(), ?format, pairs, "diff report written");
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reglens_shared::Chunk;

    fn result(position: usize, before: &str, after: &str) -> MergeResult {
        MergeResult {
            original: Chunk::new(position, before),
            updated: Chunk::new(position, after),
            line_diff: line_diff(before, after),
            fallback: false,
        }
    }

    #[test]
    fn unchanged_pairs_skipped_by_default() {
        let results = vec![result(0, "a", "a"), result(1, "b", "c")];
        let doc = DiffRenderer::new().report(&results);
        let texts: Vec<String> = doc.paragraphs.iter().map(Paragraph::text).collect();
        assert!(texts.contains(&"- b".to_string()));
        assert!(!texts.contains(&"a".to_string()));

        let all = DiffRenderer::new().include_unchanged(true).report(&results);
        assert_eq!(
            all.paragraphs
                .iter()
                .filter(|p| p.kind == ParagraphKind::Rule)
                .count(),
            2
        );
    }

    #[test]
    fn nothing_changed_gives_empty_report() {
        let doc = DiffRenderer::new().report(&[result(0, "same", "same")]);
        assert!(doc.is_empty());
    }
}

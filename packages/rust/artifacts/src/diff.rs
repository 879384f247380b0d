//! Line-level edit scripts.

use similar::{ChangeTag, TextDiff};

use reglens_shared::{DiffLine, DiffTag};

/// Compute the line diff from `original` to `updated`.
///
/// Each [`DiffLine`] keeps its line terminator, so both sides rebuild
/// byte-for-byte through [`reconstruct`]. Within a replaced block every
/// removal precedes the additions, the same ordering `ndiff` produces.
pub fn line_diff(original: &str, updated: &str) -> Vec<DiffLine> {
    TextDiff::from_lines(original, updated)
        .iter_all_changes()
        .map(|change| {
            let tag = match change.tag() {
                ChangeTag::Equal => DiffTag::Unchanged,
                ChangeTag::Delete => DiffTag::Removed,
                ChangeTag::Insert => DiffTag::Added,
            };
            DiffLine::new(tag, change.value())
        })
        .collect()
}

/// Rebuild one side of a diff: `Removed + Unchanged` lines give the original,
/// `Added + Unchanged` lines give the update.
pub fn reconstruct(lines: &[DiffLine], side: DiffTag) -> String {
    lines
        .iter()
        .filter(|l| l.tag == DiffTag::Unchanged || l.tag == side)
        .map(|l| l.text.as_str())
        .collect()
}

/// Counts of `(added, removed)` lines.
pub fn change_counts(lines: &[DiffLine]) -> (usize, usize) {
    lines.iter().fold((0, 0), |(a, r), l| match l.tag {
        DiffTag::Added => (a + 1, r),
        DiffTag::Removed => (a, r + 1),
        DiffTag::Unchanged => (a, r),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(lines: &[DiffLine]) -> Vec<DiffTag> {
        lines.iter().map(|l| l.tag).collect()
    }

    #[test]
    fn identical_text_is_all_unchanged() {
        let lines = line_diff("a\nb\nc", "a\nb\nc");
        assert_eq!(tags(&lines), vec![DiffTag::Unchanged; 3]);
    }

    #[test]
    fn replaced_line_removes_before_adding() {
        let lines = line_diff(
            "Fees are due monthly.\nLate fees apply.",
            "Fees are due quarterly.\nLate fees apply.",
        );
        let marked: Vec<String> = lines.iter().map(DiffLine::marked).collect();
        assert_eq!(
            marked,
            vec![
                "- Fees are due monthly.",
                "+ Fees are due quarterly.",
                "  Late fees apply.",
            ]
        );
    }

    #[test]
    fn multi_line_replacement_groups_removals_first() {
        let lines = line_diff("keep\nold 1\nold 2\nend", "keep\nnew 1\nnew 2\nend");
        assert_eq!(
            tags(&lines),
            vec![
                DiffTag::Unchanged,
                DiffTag::Removed,
                DiffTag::Removed,
                DiffTag::Added,
                DiffTag::Added,
                DiffTag::Unchanged,
            ]
        );
    }

    #[test]
    fn both_sides_reconstruct() {
        let a = "Article 1\nScope applies to banks.\nArticle 2\nReporting is annual.\n";
        let b = "Article 1\nScope applies to banks and insurers.\nArticle 2\nReporting is annual.\nArticle 3\nPenalties.";
        let lines = line_diff(a, b);
        assert_eq!(reconstruct(&lines, DiffTag::Removed), a);
        assert_eq!(reconstruct(&lines, DiffTag::Added), b);
        assert_eq!(change_counts(&lines), (3, 1));
    }

    #[test]
    fn empty_sides() {
        assert!(line_diff("", "").is_empty());
        assert_eq!(tags(&line_diff("", "x\ny")), vec![DiffTag::Added; 2]);
        assert_eq!(tags(&line_diff("x", "")), vec![DiffTag::Removed]);
    }

    #[test]
    fn both_sides_rebuild_exactly() {
        let cases = [
            ("Article 1\nFees are 5%.\n", "Article 1\nFees are 7%.\n"),
            ("x\r\ny", "x\r\nz\r\n"),
            ("a\r\nb\r\n", "a\nb\n"),
            ("", "only update\n"),
            ("only original", ""),
            ("dup\ndup\ndup\n", "dup\nnew\ndup\n"),
            ("no newline", "no newline\n"),
        ];
        for (a, b) in cases {
            let lines = line_diff(a, b);
            assert_eq!(reconstruct(&lines, DiffTag::Removed), a, "original of {a:?} -> {b:?}");
            assert_eq!(reconstruct(&lines, DiffTag::Added), b, "update of {a:?} -> {b:?}");
        }
    }

    #[test]
    fn unchanged_line_between_edits_is_kept() {
        let lines = line_diff(
            "Article 1\nScope applies to banks.\nArticle 2\n",
            "Article 1\nScope applies to insurers.\nArticle 2\n",
        );
        let marked: Vec<String> = lines.iter().map(DiffLine::marked).collect();
        assert_eq!(
            marked,
            vec![
                "  Article 1",
                "- Scope applies to banks.",
                "+ Scope applies to insurers.",
                "  Article 2",
            ]
        );
    }
}

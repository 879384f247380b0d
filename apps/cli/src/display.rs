//! Terminal rendering of diffs and reports.

use crossterm::style::{Color, Stylize};

use reglens_artifacts::{DiffDocument, ParagraphKind, Rgb, Run};

fn color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.0,
        g: rgb.1,
        b: rgb.2,
    }
}

fn styled(run: &Run) -> String {
    match (run.color, run.underline) {
        (Some(c), true) => run.text.as_str().with(color(c)).underlined().to_string(),
        (Some(c), false) => run.text.as_str().with(color(c)).to_string(),
        (None, true) => run.text.as_str().underlined().to_string(),
        (None, false) => run.text.clone(),
    }
}

/// Print a diff document with terminal colors.
pub(crate) fn print_document(doc: &DiffDocument) {
    for p in &doc.paragraphs {
        let line: String = p.runs.iter().map(styled).collect();
        match p.kind {
            ParagraphKind::Label => println!("{}", line.bold()),
            ParagraphKind::Rule => println!("{}", line.dark_grey()),
            ParagraphKind::Body | ParagraphKind::Diff(_) => println!("{line}"),
        }
    }
}

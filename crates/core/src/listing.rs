//! Plain-text summaries shown next to the page

use crate::store::AnnotationStore;
use std::fmt::Write;

/// Lists every bubble grouped by page, with its recognized text once recognition has
/// reported. A blank recognition is listed as blank text.
///
/// Positions are in page space with two decimals. Numbers are the same global numbers
/// drawn on screen and printed into the export.
pub fn bubble_listing(store: &AnnotationStore) -> String {
    let mut out = String::from("Bubble Positions and Text:\n");

    for page in store.pages() {
        let _ = write!(out, "\nPage {}:\n", page + 1);
        for view in store.page_views(page) {
            let _ = write!(out, "{}: ({:.2}, {:.2})", view.number, view.position.x, view.position.y);
            if let Some(text) = view.text {
                let _ = write!(out, " - Text: {text}");
            }
            out.push('\n');
        }
    }

    out
}

/// Navigation label, e.g. `Page: 2/5`. Shows `Page: 0/0` when nothing is loaded.
pub fn page_label(current: Option<usize>, total: usize) -> String {
    match current {
        Some(page) => format!("Page: {}/{}", page + 1, total),
        None => "Page: 0/0".to_owned(),
    }
}

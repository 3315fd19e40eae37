//! Overlay planning
//!
//! Turns the store into per-page marker lists in PDF user space. This is the single
//! place where page space (top-left origin) is flipped into the bottom-left convention
//! of the page writer; the device/page transforms never flip.

use crate::geometry::PageBox;
use crate::store::AnnotationStore;
use tracing::warn;

/// One bubble as it will be printed: a circle centred on `center` and its number below.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub number: usize,
    /// Circle centre in PDF user space (bottom-left origin).
    pub center: (f32, f32),
}

impl Marker {
    pub fn label(&self) -> String {
        self.number.to_string()
    }
}

/// Markers of one page in creation order; later markers are drawn on top.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOverlay {
    pub page: usize,
    pub page_box: PageBox,
    pub markers: Vec<Marker>,
}

/// Plans the overlay for a document whose pages have the given boxes.
///
/// Pages without bubbles get no entry and are copied through untouched by the writer.
pub fn plan_overlay(store: &AnnotationStore, page_boxes: &[PageBox]) -> Vec<PageOverlay> {
    let mut overlays = Vec::new();

    for page in store.pages() {
        let Some(page_box) = page_boxes.get(page).copied() else {
            warn!(page, page_count = page_boxes.len(), "bubbles on a page the document does not have");
            continue;
        };

        let markers = store
            .page_views(page)
            .into_iter()
            .map(|view| Marker { number: view.number, center: page_box.flip(view.position) })
            .collect();

        overlays.push(PageOverlay { page, page_box, markers });
    }

    overlays
}

//! Annotation store
//!
//! Single source of truth for which bubbles exist and how they are numbered.
//! Bubbles are kept per page in creation order; the global display number is always
//! derived from those sequences and never cached, so the on-screen labels and the
//! exported overlay cannot drift apart.

use crate::geometry::{PagePoint, PageRect};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Stable identity of a bubble.
///
/// Not affected by bubbles being added or removed on other pages, unlike the display number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BubbleId {
    pub page: usize,
    pub local_index: usize,
}

impl BubbleId {
    pub fn new(page: usize, local_index: usize) -> Self {
        Self { page, local_index }
    }
}

/// Captured sub-region attached to a bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Rectangle in page space.
    pub rect: PageRect,
    /// Pixels cropped from the raster that was on screen when the region was captured.
    pub image: RgbaImage,
}

/// Read-only view of one bubble with its derived number and attachments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleView<'a> {
    pub id: BubbleId,
    pub number: usize,
    pub position: PagePoint,
    pub region: Option<&'a Region>,
    pub text: Option<&'a str>,
}

/// Page-indexed, append-only bubble collection with per-bubble regions and text.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    /// Never holds an empty sequence: a page without bubbles has no entry.
    by_page: BTreeMap<usize, Vec<PagePoint>>,
    regions: HashMap<BubbleId, Region>,
    texts: HashMap<BubbleId, String>,
    /// Bumped whenever a page loses its bubbles, so late OCR results can be recognised as stale.
    epochs: HashMap<usize, u64>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a bubble to `page`. Coincident positions are kept as separate bubbles.
    pub fn add_bubble(&mut self, page: usize, position: PagePoint) -> BubbleId {
        let bubbles = self.by_page.entry(page).or_default();
        bubbles.push(position);
        BubbleId::new(page, bubbles.len() - 1)
    }

    /// Positions on `page` in creation order; empty when the page has none.
    pub fn bubbles_on_page(&self, page: usize) -> &[PagePoint] {
        self.by_page.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of bubbles on all pages with a smaller index.
    pub fn global_count_before(&self, page: usize) -> usize {
        self.by_page.range(..page).map(|(_, bubbles)| bubbles.len()).sum()
    }

    /// Display number of the `local_index`-th bubble on `page`.
    ///
    /// This is the only place numbers are computed; the screen and the export both call it.
    pub fn global_number(&self, page: usize, local_index: usize) -> usize {
        self.global_count_before(page) + local_index + 1
    }

    /// Display number of an existing bubble.
    pub fn number_of(&self, id: BubbleId) -> Option<usize> {
        self.contains(id).then(|| self.global_number(id.page, id.local_index))
    }

    pub fn contains(&self, id: BubbleId) -> bool {
        id.local_index < self.bubbles_on_page(id.page).len()
    }

    pub fn position(&self, id: BubbleId) -> Option<PagePoint> {
        self.bubbles_on_page(id.page).get(id.local_index).copied()
    }

    /// The bubble created last on `page`, if any.
    pub fn latest_on_page(&self, page: usize) -> Option<BubbleId> {
        let count = self.bubbles_on_page(page).len();
        count.checked_sub(1).map(|local_index| BubbleId::new(page, local_index))
    }

    /// Attaches `region` to an existing bubble, replacing any previous one.
    ///
    /// Returns `false` and drops the region when the bubble does not exist.
    pub fn attach_region(&mut self, id: BubbleId, region: Region) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.regions.insert(id, region);
        true
    }

    pub fn region(&self, id: BubbleId) -> Option<&Region> {
        self.regions.get(&id)
    }

    /// Stores recognized text for a bubble, provided the bubble still exists and its page
    /// has not been cleared since `epoch` was read.
    pub fn set_text(&mut self, id: BubbleId, epoch: u64, text: String) -> bool {
        if !self.contains(id) || self.epoch(id.page) != epoch {
            return false;
        }
        self.texts.insert(id, text);
        true
    }

    pub fn text(&self, id: BubbleId) -> Option<&str> {
        self.texts.get(&id).map(String::as_str)
    }

    /// Clear generation of `page`.
    pub fn epoch(&self, page: usize) -> u64 {
        self.epochs.get(&page).copied().unwrap_or(0)
    }

    /// Removes the bubbles on `page` together with their regions and text.
    pub fn clear_page(&mut self, page: usize) {
        if self.by_page.remove(&page).is_some() {
            *self.epochs.entry(page).or_insert(0) += 1;
        }
        self.regions.retain(|id, _| id.page != page);
        self.texts.retain(|id, _| id.page != page);
    }

    /// Empties every collection.
    pub fn clear_all(&mut self) {
        for page in self.by_page.keys() {
            *self.epochs.entry(*page).or_insert(0) += 1;
        }
        self.by_page.clear();
        self.regions.clear();
        self.texts.clear();
    }

    /// Pages that currently hold bubbles, ascending.
    pub fn pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_page.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_page.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_page.is_empty()
    }

    /// Bubbles of one page in creation order, numbered.
    pub fn page_views(&self, page: usize) -> Vec<BubbleView<'_>> {
        let first = self.global_count_before(page);
        self.bubbles_on_page(page)
            .iter()
            .enumerate()
            .map(|(local_index, position)| {
                let id = BubbleId::new(page, local_index);
                BubbleView {
                    id,
                    number: first + local_index + 1,
                    position: *position,
                    region: self.regions.get(&id),
                    text: self.text(id),
                }
            })
            .collect()
    }

    /// Every bubble in display order: page ascending, then creation order.
    pub fn views(&self) -> Vec<BubbleView<'_>> {
        self.pages().flat_map(|page| self.page_views(page)).collect()
    }
}

//! Catalog items as handed over by the enumeration layer
//!
//! The core only references items; enumeration (directory walking, file
//! filtering) lives elsewhere and produces an ordered `Vec<CatalogItem>`.

use std::collections::HashMap;
use uuid::Uuid;

/// One media item of the gallery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Stable identity for the lifetime of the item
    pub id: Uuid,
    /// Absolute filesystem path or URL
    pub locator: String,
    /// Local sources get the full retry budget even for fatal codes
    pub is_local: bool,
}

impl CatalogItem {
    /// Local file item with a fresh id
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            locator: path.into(),
            is_local: true,
        }
    }

    /// Remote (URL) item with a fresh id
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            locator: url.into(),
            is_local: false,
        }
    }

    /// Classify a locator: `scheme://...` other than `file://` is remote,
    /// everything else (absolute paths, drive-letter paths, file URLs) is local.
    pub fn from_locator(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        let is_local = match locator.split_once("://") {
            Some((scheme, _)) => {
                scheme.len() <= 1 || scheme.eq_ignore_ascii_case("file") || !is_scheme(scheme)
            }
            None => true,
        };
        Self {
            id: Uuid::new_v4(),
            locator,
            is_local,
        }
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Ordered catalog with id → position lookup
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    positions: HashMap<Uuid, usize>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        let positions = items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.id, index))
            .collect();
        Self { items, positions }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&CatalogItem> {
        self.positions.get(id).map(|&index| &self.items[index])
    }

    /// Position of an item in catalog order
    pub fn position(&self, id: &Uuid) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Ids within `margin` positions of `index`, nearest first, excluding `index`
    pub fn neighbours(&self, index: usize, margin: usize) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(margin * 2);
        for distance in 1..=margin {
            if let Some(item) = index.checked_add(distance).and_then(|i| self.items.get(i)) {
                ids.push(item.id);
            }
            if let Some(item) = index.checked_sub(distance).and_then(|i| self.items.get(i)) {
                ids.push(item.id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_classification() {
        assert!(CatalogItem::from_locator("/home/me/clip.mp4").is_local);
        assert!(CatalogItem::from_locator("C:\\Videos\\clip.mp4").is_local);
        assert!(CatalogItem::from_locator("file:///home/me/clip.mp4").is_local);
        assert!(!CatalogItem::from_locator("https://cdn.example.com/clip.mp4").is_local);
        assert!(!CatalogItem::from_locator("rtsp://camera/stream").is_local);
    }

    #[test]
    fn test_positions_follow_order() {
        let items: Vec<_> = (0..5).map(|i| CatalogItem::local(format!("/v/{}.mp4", i))).collect();
        let ids: Vec<_> = items.iter().map(|item| item.id).collect();
        let catalog = Catalog::new(items);

        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.position(&ids[3]), Some(3));
        assert_eq!(catalog.get(&ids[1]).unwrap().locator, "/v/1.mp4");
        assert!(catalog.position(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_neighbours_nearest_first_and_clipped() {
        let items: Vec<_> = (0..5).map(|i| CatalogItem::local(format!("/v/{}.mp4", i))).collect();
        let ids: Vec<_> = items.iter().map(|item| item.id).collect();
        let catalog = Catalog::new(items);

        assert_eq!(catalog.neighbours(0, 2), vec![ids[1], ids[2]]);
        assert_eq!(catalog.neighbours(2, 1), vec![ids[3], ids[1]]);
        assert!(catalog.neighbours(2, 0).is_empty());
    }
}

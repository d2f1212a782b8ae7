//! # Gallery Components
//!
//! Client-side model of "what photos do I see": a newest-first list fed from
//! two directions. Fresh self-captures are prepended and keep the list capped;
//! the server's bulk listing is appended without any cap, so a long-running
//! server can show more history than the capture path retains. The
//! [`refresh`] module keeps the listing side current in the background.

pub mod refresh;

use chrono::{DateTime, Local};
use std::collections::VecDeque;

pub use refresh::GalleryRefresher;

/// Default number of entries the self-capture path retains.
pub const DEFAULT_GALLERY_LIMIT: usize = 10;

/// One photo shown in the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    /// Server-relative or absolute URL of the photo
    pub url: String,
    /// When this entry appeared locally
    pub taken_at: DateTime<Local>,
}

impl GalleryEntry {
    pub fn new(url: impl Into<String>) -> Self {
        GalleryEntry {
            url: url.into(),
            taken_at: Local::now(),
        }
    }
}

/// Newest-first photo list with asymmetric growth rules.
///
/// [`record_capture`](Gallery::record_capture) prepends and evicts past the
/// cap; [`absorb_listing`](Gallery::absorb_listing) appends unbounded. The
/// asymmetry is deliberate: the cap is a self-capture UX bound, not a limit
/// on how much server history may be shown.
#[derive(Debug)]
pub struct Gallery {
    entries: VecDeque<GalleryEntry>,
    limit: usize,
}

impl Gallery {
    /// Creates a gallery keeping at most `limit` self-captured entries.
    /// A limit of zero is treated as one; the freshest photo is always kept.
    pub fn new(limit: usize) -> Self {
        Gallery {
            entries: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Prepend a freshly captured photo, evicting the oldest entries past the
    /// cap.
    pub fn record_capture(&mut self, entry: GalleryEntry) {
        self.entries.push_front(entry);
        while self.entries.len() > self.limit {
            self.entries.pop_back();
        }
    }

    /// Append photos from a server listing, skipping URLs already shown.
    /// No cap applies on this path.
    pub fn absorb_listing<I>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for url in urls {
            if !self.entries.iter().any(|e| e.url == url) {
                self.entries.push_back(GalleryEntry::new(url));
                added += 1;
            }
        }
        added
    }

    /// Entries newest-first.
    pub fn entries(&self) -> impl Iterator<Item = &GalleryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain-text rendering for terminal display.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "Photo Gallery (empty)".to_string();
        }

        let mut out = format!(
            "Photo Gallery ({} photo{})\n",
            self.entries.len(),
            if self.entries.len() == 1 { "" } else { "s" }
        );
        for (index, entry) in self.entries.iter().enumerate() {
            out.push_str(&format!(
                "  {:>2}. {}  [{}]\n",
                index + 1,
                entry.url,
                entry.taken_at.format("%H:%M:%S")
            ));
        }
        out
    }
}

impl Default for Gallery {
    fn default() -> Self {
        Gallery::new(DEFAULT_GALLERY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(n: usize) -> String {
        format!("/uploads/photo-{}.jpg", n)
    }

    #[test]
    fn test_capture_path_caps_at_limit() {
        let mut gallery = Gallery::new(10);
        for n in 0..10 {
            gallery.record_capture(GalleryEntry::new(url(n)));
        }
        assert_eq!(gallery.len(), 10);

        gallery.record_capture(GalleryEntry::new(url(10)));

        assert_eq!(gallery.len(), 10);
        // Newest first, oldest (photo-0) evicted
        let urls: Vec<&str> = gallery.entries().map(|e| e.url.as_str()).collect();
        assert_eq!(urls[0], url(10));
        assert!(!urls.contains(&url(0).as_str()));
        assert!(urls.contains(&url(1).as_str()));
    }

    #[test]
    fn test_listing_path_is_unbounded() {
        let mut gallery = Gallery::new(10);
        let absorbed = gallery.absorb_listing((0..15).map(url));

        assert_eq!(absorbed, 15);
        assert_eq!(gallery.len(), 15);
    }

    #[test]
    fn test_capture_after_long_listing_trims_to_cap() {
        let mut gallery = Gallery::new(10);
        gallery.absorb_listing((0..12).map(url));
        assert_eq!(gallery.len(), 12);

        gallery.record_capture(GalleryEntry::new("/uploads/fresh.jpg"));

        // The cap is enforced at capture insertions only
        assert_eq!(gallery.len(), 10);
        assert_eq!(gallery.entries().next().unwrap().url, "/uploads/fresh.jpg");
    }

    #[test]
    fn test_absorb_skips_known_urls() {
        let mut gallery = Gallery::new(10);
        gallery.absorb_listing(vec![url(1), url(2)]);
        gallery.record_capture(GalleryEntry::new(url(3)));

        let absorbed = gallery.absorb_listing(vec![url(1), url(2), url(3), url(4)]);

        assert_eq!(absorbed, 1);
        assert_eq!(gallery.len(), 4);
    }

    #[test]
    fn test_captures_are_newest_first() {
        let mut gallery = Gallery::new(10);
        gallery.record_capture(GalleryEntry::new(url(1)));
        gallery.record_capture(GalleryEntry::new(url(2)));

        let urls: Vec<&str> = gallery.entries().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec![url(2).as_str(), url(1).as_str()]);
    }

    #[test]
    fn test_zero_limit_keeps_freshest() {
        let mut gallery = Gallery::new(0);
        gallery.record_capture(GalleryEntry::new(url(1)));
        gallery.record_capture(GalleryEntry::new(url(2)));

        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.entries().next().unwrap().url, url(2));
    }

    #[test]
    fn test_render_lists_entries_in_order() {
        let mut gallery = Gallery::new(10);
        gallery.record_capture(GalleryEntry::new(url(1)));
        gallery.record_capture(GalleryEntry::new(url(2)));

        let rendered = gallery.render();
        assert!(rendered.starts_with("Photo Gallery (2 photos)"));
        let first = rendered.find(&url(2)).unwrap();
        let second = rendered.find(&url(1)).unwrap();
        assert!(first < second);

        assert_eq!(Gallery::new(5).render(), "Photo Gallery (empty)");
    }
}

//! # Background Gallery Refresh
//!
//! Polls the server's photo listing on a fixed interval and folds new URLs
//! into the shared [`Gallery`]. One poll failing is logged and skipped; the
//! next tick simply tries again at the normal cadence, without backoff. The
//! task runs until [`GalleryRefresher::stop`] is called or the handle is
//! dropped, so an exiting client never leaves a poller behind.

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::Gallery;
use crate::capture::PhotoUploader;

/// Handle to the background polling task.
pub struct GalleryRefresher {
    handle: JoinHandle<()>,
}

impl GalleryRefresher {
    /// Spawn the polling task. `every` must be non-zero; callers disable
    /// refreshing by not spawning a refresher at all.
    pub fn spawn(
        gallery: Arc<Mutex<Gallery>>,
        uploader: Arc<PhotoUploader>,
        every: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the startup backfill already
            // covered that, so consume it and start waiting.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match uploader.list_photos().await {
                    Ok(urls) => {
                        let mut gallery = gallery.lock().await;
                        let added = gallery.absorb_listing(urls);
                        if added > 0 {
                            debug!("🔄 Gallery refresh picked up {} new photos", added);
                        }
                    }
                    Err(e) => {
                        warn!("Gallery refresh failed: {}", e);
                    }
                }
            }
        });
        Self {
            handle,
        }
    }

    /// Stop polling. Idempotent with the drop behavior.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for GalleryRefresher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected during a harvest run
#[derive(Default)]
pub struct HarvestStats {
    pub index_urls: AtomicU64,
    pub shows: AtomicU64,
    pub broadcasts: AtomicU64,
    pub streams: AtomicU64,
    pub seed_failures: AtomicU64,
    pub show_failures: AtomicU64,
    pub broadcast_failures: AtomicU64,
    pub stream_failures: AtomicU64,
    pub records_inserted: AtomicU64,
    pub duplicates_ignored: AtomicU64,
}

impl HarvestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_index_urls(&self, count: u64) {
        self.index_urls.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_shows(&self, count: u64) {
        self.shows.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_broadcasts(&self, count: u64) {
        self.broadcasts.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_streams(&self, count: u64) {
        self.streams.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_seed_failures(&self, count: u64) {
        self.seed_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_show_failures(&self, count: u64) {
        self.show_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_broadcast_failures(&self, count: u64) {
        self.broadcast_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_stream_failures(&self, count: u64) {
        self.stream_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_inserted(&self, inserted: u64, ignored: u64) {
        self.records_inserted.fetch_add(inserted, Ordering::Relaxed);
        self.duplicates_ignored.fetch_add(ignored, Ordering::Relaxed);
    }

    pub fn index_urls(&self) -> u64 {
        self.index_urls.load(Ordering::Relaxed)
    }

    pub fn shows(&self) -> u64 {
        self.shows.load(Ordering::Relaxed)
    }

    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    pub fn streams(&self) -> u64 {
        self.streams.load(Ordering::Relaxed)
    }

    pub fn seed_failures(&self) -> u64 {
        self.seed_failures.load(Ordering::Relaxed)
    }

    pub fn show_failures(&self) -> u64 {
        self.show_failures.load(Ordering::Relaxed)
    }

    pub fn broadcast_failures(&self) -> u64 {
        self.broadcast_failures.load(Ordering::Relaxed)
    }

    pub fn stream_failures(&self) -> u64 {
        self.stream_failures.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.seed_failures()
            + self.show_failures()
            + self.broadcast_failures()
            + self.stream_failures()
    }

    pub fn records_inserted(&self) -> u64 {
        self.records_inserted.load(Ordering::Relaxed)
    }

    pub fn duplicates_ignored(&self) -> u64 {
        self.duplicates_ignored.load(Ordering::Relaxed)
    }
}

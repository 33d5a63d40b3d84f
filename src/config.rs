/// Site root; relative links found on scraped pages are resolved against it
pub const BASE_URL: &str = "http://www.mdr.de";

/// Channel name stored with every record harvested from the site
pub const CHANNEL: &str = "MDR";

/// Seed index enumerating shows by letter
pub const LETTER_INDEX_PATH: &str = "/mediathek/fernsehen/a-z/index.html";
pub const LETTER_LINK_PATTERN: &str =
    "/mediathek/fernsehen/a-z/sendungenabisz100_inheritancecontext-header_letter-";

/// Seed index enumerating broadcasts by day
pub const DAY_INDEX_PATH: &str = "/mediathek/fernsehen/index.html";
pub const DAY_LINK_PATTERN: &str = "/mediathek/fernsehen/sendung-verpasst--100_date-";

/// Headline links on show and broadcast pages must contain this path
pub const TEASER_LINK_PATTERN: &str = "/mediathek/fernsehen/";

pub const USER_AGENT: &str = concat!("mediathek/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_SEED_WORKERS: usize = 1;
pub const DEFAULT_SHOW_WORKERS: usize = 3;
pub const DEFAULT_BROADCAST_WORKERS: usize = 3;
pub const DEFAULT_STREAM_WORKERS: usize = 3;

/// Buffer size for the CSV writers
pub const CSV_BUFFER_SIZE: usize = 128 * 1024;

/// Knobs for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub base_url: String,
    pub seed_workers: usize,
    pub show_workers: usize,
    pub broadcast_workers: usize,
    pub stream_workers: usize,
    /// Only expand the first N index pages (for testing against the live site)
    pub index_limit: Option<usize>,
    pub progress: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            seed_workers: DEFAULT_SEED_WORKERS,
            show_workers: DEFAULT_SHOW_WORKERS,
            broadcast_workers: DEFAULT_BROADCAST_WORKERS,
            stream_workers: DEFAULT_STREAM_WORKERS,
            index_limit: None,
            progress: true,
        }
    }
}

/// Resolves a scraped link against `base`.
///
/// Absolute `http(s)://` links are returned unchanged, everything else is
/// treated as a site-relative path.
pub fn absolutize(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    let base = base.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolutize_relative_path() {
        assert_eq!(
            absolutize(BASE_URL, "/mediathek/fernsehen/index.html"),
            "http://www.mdr.de/mediathek/fernsehen/index.html"
        );
    }

    #[test]
    fn absolutize_keeps_absolute_links() {
        assert_eq!(
            absolutize(BASE_URL, "http://www.mdr.de/a.html"),
            "http://www.mdr.de/a.html"
        );
        assert_eq!(
            absolutize(BASE_URL, "https://cdn.example/x.mp4"),
            "https://cdn.example/x.mp4"
        );
    }

    #[test]
    fn absolutize_handles_trailing_slash_and_bare_path() {
        assert_eq!(absolutize("http://host/", "/a"), "http://host/a");
        assert_eq!(absolutize("http://host", "a"), "http://host/a");
    }

    #[test]
    fn default_pool_sizes() {
        let config = HarvestConfig::default();
        assert_eq!(config.seed_workers, 1);
        assert_eq!(config.show_workers, 3);
        assert_eq!(config.broadcast_workers, 3);
        assert_eq!(config.stream_workers, 3);
        assert!(config.index_limit.is_none());
    }
}

use crate::config::CHANNEL;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedKind {
    Letters,
    Days,
}

impl SeedKind {
    pub fn label(&self) -> &'static str {
        match self {
            SeedKind::Letters => "letters",
            SeedKind::Days => "days",
        }
    }
}

/// One of the two top-level pages the harvest starts from.
#[derive(Debug, Clone)]
pub struct SeedIndex {
    pub kind: SeedKind,
    pub url: String,
    /// Substring every wanted link on the page contains
    pub link_pattern: String,
}

/// A letter or day page listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUrl(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowEntry {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEntry {
    pub show_title: String,
    pub title: String,
    pub url: String,
}

/// Metadata and renditions read from a broadcast's asset feed.
#[derive(Debug, Clone, Default)]
pub struct FeedMetadata {
    pub duration: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub url_web: Option<String>,
    /// Quality variant name (`XL`, `L`, `L+`, `M`, ...) to download URL
    pub variants: FxHashMap<String, String>,
}

/// Download URLs picked from the feed's quality variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityUrls {
    pub large: Option<String>,
    pub medium: Option<String>,
    pub small: Option<String>,
}

impl QualityUrls {
    /// `XL` is large, `L` (or `L+` without `L`) is medium, `M` is small.
    pub fn resolve(variants: &FxHashMap<String, String>) -> Self {
        Self {
            large: variants.get("XL").cloned(),
            medium: variants.get("L").or_else(|| variants.get("L+")).cloned(),
            small: variants.get("M").cloned(),
        }
    }
}

/// One playable broadcast. Keyed by the URL of the asset feed it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub source_url: String,
    pub channel: String,
    pub topic: String,
    pub title: String,
    pub date: String,
    pub time: String,
    pub duration: String,
    pub description: String,
    pub url_web: Option<String>,
    pub url_large: Option<String>,
    pub url_medium: Option<String>,
    pub url_small: Option<String>,
}

impl StreamRecord {
    pub fn from_feed(broadcast: BroadcastEntry, source_url: String, feed: FeedMetadata) -> Self {
        let urls = QualityUrls::resolve(&feed.variants);

        Self {
            source_url,
            channel: CHANNEL.to_string(),
            topic: broadcast.show_title,
            title: broadcast.title,
            date: feed.date,
            time: feed.time,
            duration: feed.duration,
            description: feed.description,
            url_web: feed.url_web,
            url_large: urls.large,
            url_medium: urls.medium,
            url_small: urls.small,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variants(pairs: &[(&str, &str)]) -> FxHashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolve_all_variants() {
        let urls = QualityUrls::resolve(&variants(&[
            ("XL", "http://cdn/xl.mp4"),
            ("L", "http://cdn/l.mp4"),
            ("L+", "http://cdn/lplus.mp4"),
            ("M", "http://cdn/m.mp4"),
        ]));
        assert_eq!(urls.large.as_deref(), Some("http://cdn/xl.mp4"));
        assert_eq!(urls.medium.as_deref(), Some("http://cdn/l.mp4"));
        assert_eq!(urls.small.as_deref(), Some("http://cdn/m.mp4"));
    }

    #[test]
    fn medium_falls_back_to_l_plus() {
        let urls = QualityUrls::resolve(&variants(&[("L+", "http://cdn/lplus.mp4")]));
        assert_eq!(urls.medium.as_deref(), Some("http://cdn/lplus.mp4"));
        assert!(urls.large.is_none());
        assert!(urls.small.is_none());
    }

    #[test]
    fn missing_variants_stay_empty() {
        let urls = QualityUrls::resolve(&variants(&[("S", "http://cdn/s.mp4")]));
        assert_eq!(urls, QualityUrls::default());
    }

    #[test]
    fn record_from_feed() {
        let broadcast = BroadcastEntry {
            show_title: "Sachsenspiegel".to_string(),
            title: "Ausgabe vom 1.2.".to_string(),
            url: "http://www.mdr.de/b.html".to_string(),
        };
        let feed = FeedMetadata {
            duration: "00:29:00".to_string(),
            description: "Nachrichten".to_string(),
            date: "01.02.2017".to_string(),
            time: "19:00".to_string(),
            url_web: Some("http://www.mdr.de/b.html".to_string()),
            variants: variants(&[("XL", "http://cdn/xl.mp4"), ("M", "http://cdn/m.mp4")]),
        };

        let record = StreamRecord::from_feed(broadcast, "http://www.mdr.de/b.xml".to_string(), feed);
        assert_eq!(record.channel, "MDR");
        assert_eq!(record.topic, "Sachsenspiegel");
        assert_eq!(record.source_url, "http://www.mdr.de/b.xml");
        assert_eq!(record.url_large.as_deref(), Some("http://cdn/xl.mp4"));
        assert!(record.url_medium.is_none());
        assert_eq!(record.url_small.as_deref(), Some("http://cdn/m.mp4"));
    }
}

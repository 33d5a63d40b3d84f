use crate::config::{absolutize, TEASER_LINK_PATTERN};
use crate::error::ScrapeError;
use crate::models::{BroadcastEntry, FeedMetadata, ShowEntry};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

static TEASER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#content .shortInfos").unwrap());

static HEADLINE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(&format!("a.headline[href*=\"{TEASER_LINK_PATTERN}\"]")).unwrap()
});

static SHOW_SUBTITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.subtitle a").unwrap());

static BROADCAST_SUBTITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.subtitle").unwrap());

static PLAYER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.mediaCon[data-ctrl-player*=\"playerXml\"]").unwrap());

static PROFILE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\| MP4 Web (\w+\+?) \|").unwrap());

/// The `data-ctrl-player` attribute of a broadcast page's player element.
#[derive(Deserialize)]
struct PlayerConfig {
    #[serde(rename = "playerXml")]
    player_xml: String,
}

/// Every link on a seed page whose href contains `pattern`, in document order.
pub fn index_links(html: &str, base: &str, pattern: &str) -> Result<Vec<String>, ScrapeError> {
    let selector = Selector::parse(&format!("a[href*=\"{pattern}\"]"))
        .map_err(|e| ScrapeError::extract(base, format!("invalid link pattern: {e}")))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| absolutize(base, href))
        .collect())
}

/// Show teasers listed on a letter or day page.
pub fn show_entries(html: &str, base: &str) -> Vec<ShowEntry> {
    teasers(html, base, &SHOW_SUBTITLE_SELECTOR)
        .into_iter()
        .map(|(title, url)| ShowEntry { title, url })
        .collect()
}

/// Broadcast teasers listed on a show page.
pub fn broadcast_entries(html: &str, base: &str, show_title: &str) -> Vec<BroadcastEntry> {
    teasers(html, base, &BROADCAST_SUBTITLE_SELECTOR)
        .into_iter()
        .map(|(title, url)| BroadcastEntry {
            show_title: show_title.to_string(),
            title,
            url,
        })
        .collect()
}

/// `(title, absolute url)` for each teaser block that has a headline link.
/// A non-empty subtitle is appended to the title as `" - subtitle"`.
fn teasers(html: &str, base: &str, subtitle_selector: &Selector) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let mut result = Vec::new();

    for teaser in document.select(&TEASER_SELECTOR) {
        let Some(headline) = teaser.select(&HEADLINE_SELECTOR).next() else {
            continue;
        };
        let Some(href) = headline.value().attr("href") else {
            continue;
        };

        let mut title = element_text(&headline);
        if let Some(subtitle) = teaser.select(subtitle_selector).next() {
            let subtitle = element_text(&subtitle);
            if !subtitle.is_empty() {
                title.push_str(" - ");
                title.push_str(&subtitle);
            }
        }

        result.push((title, absolutize(base, href)));
    }

    result
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Absolute URL of the asset feed referenced by a broadcast page's player.
pub fn player_feed_url(html: &str, base: &str, page_url: &str) -> Result<String, ScrapeError> {
    let attribute = {
        let document = Html::parse_document(html);
        let player = document
            .select(&PLAYER_SELECTOR)
            .next()
            .ok_or_else(|| ScrapeError::extract(page_url, "no player element"))?;
        player
            .value()
            .attr("data-ctrl-player")
            .map(str::to_string)
            .ok_or_else(|| ScrapeError::extract(page_url, "player without configuration"))?
    };

    // The attribute holds JSON written with single quotes.
    let config: PlayerConfig = serde_json::from_str(&attribute.replace('\'', "\""))
        .map_err(|e| ScrapeError::extract(page_url, format!("malformed player configuration: {e}")))?;

    Ok(absolutize(base, &config.player_xml))
}

#[derive(Default)]
struct AssetFields {
    profile_name: Option<String>,
    download_url: Option<String>,
}

/// Reads broadcast metadata and quality variants from an asset feed.
pub fn parse_feed(xml: &str, feed_url: &str) -> Result<FeedMetadata, ScrapeError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();

    let mut duration = None;
    let mut description = None;
    let mut start = None;
    let mut url_web = None;
    let mut in_broadcast = false;
    let mut broadcast_done = false;
    let mut asset: Option<AssetFields> = None;
    let mut metadata = FeedMetadata::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ScrapeError::extract(feed_url, format!("malformed feed: {e}")))?;

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "broadcast" if !broadcast_done => in_broadcast = true,
                    "asset" if path.last().map(String::as_str) == Some("assets") => {
                        asset = Some(AssetFields::default());
                    }
                    _ => {}
                }
                path.push(name);
                text.clear();
            }
            Event::Text(t) => {
                let chunk = t
                    .unescape()
                    .map_err(|e| ScrapeError::extract(feed_url, format!("malformed feed: {e}")))?;
                text.push_str(&chunk);
            }
            Event::CData(c) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(_) => {
                let Some(name) = path.pop() else {
                    return Err(ScrapeError::extract(feed_url, "unbalanced feed document"));
                };
                let value = text.trim().to_string();
                text.clear();

                match name.as_str() {
                    "duration" if duration.is_none() && !value.is_empty() => duration = Some(value),
                    "teaserText" if description.is_none() && !value.is_empty() => {
                        description = Some(value)
                    }
                    "broadcastStartDate" if in_broadcast => start = Some(value),
                    "broadcastURL" if in_broadcast && !value.is_empty() => url_web = Some(value),
                    "broadcast" if in_broadcast => {
                        in_broadcast = false;
                        broadcast_done = true;
                    }
                    "profileName" => {
                        if let Some(fields) = asset.as_mut() {
                            fields.profile_name = Some(value);
                        }
                    }
                    "progressiveDownloadUrl" => {
                        if let Some(fields) = asset.as_mut() {
                            fields.download_url = Some(value);
                        }
                    }
                    "asset" => {
                        if let Some(AssetFields {
                            profile_name: Some(profile),
                            download_url: Some(url),
                        }) = asset.take()
                        {
                            if let Some(caps) = PROFILE_REGEX.captures(&profile) {
                                metadata.variants.insert(caps[1].to_string(), url);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    metadata.duration = duration.ok_or_else(|| ScrapeError::extract(feed_url, "no duration"))?;
    metadata.description =
        description.ok_or_else(|| ScrapeError::extract(feed_url, "no teaser text"))?;
    metadata.url_web = url_web;

    let start = start.ok_or_else(|| ScrapeError::extract(feed_url, "no broadcast start date"))?;
    let mut parts = start.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(time), None) => {
            metadata.date = date.to_string();
            metadata.time = time.to_string();
        }
        _ => {
            return Err(ScrapeError::extract(
                feed_url,
                format!("malformed broadcast start date '{start}'"),
            ))
        }
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BASE_URL, DAY_LINK_PATTERN};

    const DAY_PAGE: &str = r#"<html><body>
        <a href="/mediathek/fernsehen/sendung-verpasst--100_date-2017-02-01.html">Mi</a>
        <a href="/unrelated.html">Other</a>
        <a href="http://www.mdr.de/mediathek/fernsehen/sendung-verpasst--100_date-2017-02-02.html">Do</a>
    </body></html>"#;

    const SHOW_LIST: &str = r#"<html><body><div id="content">
        <div class="shortInfos">
            <a class="headline" href="/mediathek/fernsehen/sachsenspiegel-100.html">Sachsenspiegel</a>
            <p class="subtitle"><a href="/x">Nachrichten</a></p>
        </div>
        <div class="shortInfos">
            <a class="headline" href="/elsewhere/page.html">Skipped</a>
        </div>
        <div class="shortInfos">
            <a class="headline" href="/mediathek/fernsehen/riverboat-100.html">Riverboat</a>
        </div>
    </div>
    <div class="shortInfos">
        <a class="headline" href="/mediathek/fernsehen/outside-100.html">Outside content</a>
    </div></body></html>"#;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <avDocument>
            <duration>00:29:45</duration>
            <teaserText>Aktuelles &amp; Wetter</teaserText>
            <broadcast>
                <broadcastStartDate>01.02.2017 19:00</broadcastStartDate>
                <broadcastURL>http://www.mdr.de/sachsenspiegel/video-1.html</broadcastURL>
            </broadcast>
            <assets>
                <asset>
                    <profileName>Video | MP4 Web XL | 16:9 | 1280x720</profileName>
                    <progressiveDownloadUrl>http://cdn.example/a/show1_xl.mp4</progressiveDownloadUrl>
                </asset>
                <asset>
                    <profileName>Video | MP4 Web L+ | 16:9 | 960x540</profileName>
                    <progressiveDownloadUrl>http://cdn.example/a/show1_lplus.mp4</progressiveDownloadUrl>
                </asset>
                <asset>
                    <profileName>Video | MP4 Web M | 16:9 | 640x360</profileName>
                    <progressiveDownloadUrl>http://cdn.example/a/show1_m.mp4</progressiveDownloadUrl>
                </asset>
                <asset>
                    <profileName>Audio | MP3 | 128k</profileName>
                    <progressiveDownloadUrl>http://cdn.example/a/show1.mp3</progressiveDownloadUrl>
                </asset>
                <asset>
                    <profileName>Video | MP4 Web S | 16:9 | 480x270</profileName>
                </asset>
            </assets>
        </avDocument>"#;

    #[test]
    fn index_links_match_pattern() {
        let links = index_links(DAY_PAGE, BASE_URL, DAY_LINK_PATTERN).unwrap();
        assert_eq!(
            links,
            vec![
                "http://www.mdr.de/mediathek/fernsehen/sendung-verpasst--100_date-2017-02-01.html",
                "http://www.mdr.de/mediathek/fernsehen/sendung-verpasst--100_date-2017-02-02.html",
            ]
        );
    }

    #[test]
    fn index_links_empty_page() {
        let links = index_links("<html></html>", BASE_URL, DAY_LINK_PATTERN).unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn show_entries_from_content_only() {
        let shows = show_entries(SHOW_LIST, BASE_URL);
        assert_eq!(shows.len(), 2);
        assert_eq!(shows[0].title, "Sachsenspiegel - Nachrichten");
        assert_eq!(
            shows[0].url,
            "http://www.mdr.de/mediathek/fernsehen/sachsenspiegel-100.html"
        );
        assert_eq!(shows[1].title, "Riverboat");
    }

    #[test]
    fn broadcast_entries_carry_show_title() {
        let html = r#"<div id="content"><div class="shortInfos">
            <a class="headline" href="/mediathek/fernsehen/video-1.html">Ausgabe</a>
            <p class="subtitle">01.02.2017</p>
        </div></div>"#;
        let broadcasts = broadcast_entries(html, BASE_URL, "Sachsenspiegel");
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].show_title, "Sachsenspiegel");
        assert_eq!(broadcasts[0].title, "Ausgabe - 01.02.2017");
        assert_eq!(
            broadcasts[0].url,
            "http://www.mdr.de/mediathek/fernsehen/video-1.html"
        );
    }

    #[test]
    fn player_feed_url_from_single_quoted_json() {
        let html = r#"<div class="mediaCon fullWidth" data-ctrl-player="{'playerXml':'/mediathek/video-1-avCustom.xml','id':'1'}"></div>"#;
        let url = player_feed_url(html, BASE_URL, "http://www.mdr.de/v.html").unwrap();
        assert_eq!(url, "http://www.mdr.de/mediathek/video-1-avCustom.xml");
    }

    #[test]
    fn player_missing_is_extract_error() {
        let err = player_feed_url("<html></html>", BASE_URL, "http://www.mdr.de/v.html").unwrap_err();
        assert!(matches!(err, ScrapeError::Extract { .. }));
        assert_eq!(err.url(), "http://www.mdr.de/v.html");
    }

    #[test]
    fn parse_feed_reads_metadata_and_variants() {
        let feed = parse_feed(FEED, "http://www.mdr.de/f.xml").unwrap();
        assert_eq!(feed.duration, "00:29:45");
        assert_eq!(feed.description, "Aktuelles & Wetter");
        assert_eq!(feed.date, "01.02.2017");
        assert_eq!(feed.time, "19:00");
        assert_eq!(
            feed.url_web.as_deref(),
            Some("http://www.mdr.de/sachsenspiegel/video-1.html")
        );
        assert_eq!(feed.variants.len(), 3);
        assert_eq!(feed.variants["XL"], "http://cdn.example/a/show1_xl.mp4");
        assert_eq!(feed.variants["L+"], "http://cdn.example/a/show1_lplus.mp4");
        assert_eq!(feed.variants["M"], "http://cdn.example/a/show1_m.mp4");
    }

    #[test]
    fn parse_feed_without_duration_fails() {
        let xml = "<avDocument><teaserText>x</teaserText><broadcast><broadcastStartDate>01.02.2017 19:00</broadcastStartDate></broadcast></avDocument>";
        let err = parse_feed(xml, "http://www.mdr.de/f.xml").unwrap_err();
        assert!(err.to_string().contains("no duration"));
    }

    #[test]
    fn parse_feed_with_empty_duration_fails() {
        let xml = FEED.replace("<duration>00:29:45</duration>", "<duration></duration>");
        let err = parse_feed(&xml, "http://www.mdr.de/f.xml").unwrap_err();
        assert!(matches!(err, ScrapeError::Extract { .. }));
        assert!(err.to_string().contains("no duration"));
    }

    #[test]
    fn parse_feed_skips_empty_duration_elements() {
        let xml = FEED.replace(
            "<duration>00:29:45</duration>",
            "<duration></duration><duration>00:29:45</duration>",
        );
        assert_eq!(parse_feed(&xml, "http://www.mdr.de/f.xml").unwrap().duration, "00:29:45");
    }

    #[test]
    fn parse_feed_without_teaser_text_fails() {
        let xml = FEED.replace("<teaserText>Aktuelles &amp; Wetter</teaserText>", "");
        let err = parse_feed(&xml, "http://www.mdr.de/f.xml").unwrap_err();
        assert!(err.to_string().contains("no teaser text"));

        let xml = FEED.replace("Aktuelles &amp; Wetter", "");
        assert!(parse_feed(&xml, "http://www.mdr.de/f.xml").is_err());
    }

    #[test]
    fn parse_feed_with_malformed_start_date_fails() {
        let xml = "<avDocument><duration>1</duration><teaserText>x</teaserText><broadcast><broadcastStartDate>01.02.2017</broadcastStartDate></broadcast></avDocument>";
        assert!(parse_feed(xml, "http://www.mdr.de/f.xml").is_err());
    }

    #[test]
    fn parse_feed_rejects_garbage() {
        assert!(parse_feed("<a><b></a>", "http://www.mdr.de/f.xml").is_err());
    }
}

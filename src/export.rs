use crate::config::CSV_BUFFER_SIZE;
use crate::error::StoreError;
use crate::models::StreamRecord;
use crate::store::{Group, Store, UrlFamily};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

pub const COLUMNS: [&str; 15] = [
    "channel",
    "channel_prefix",
    "channel_web_prefix",
    "topic",
    "topic_prefix",
    "topic_web_prefix",
    "title",
    "date",
    "time",
    "duration",
    "description",
    "url_web",
    "url_large",
    "url_medium",
    "url_small",
];

/// Longest prefix shared by every non-null value of `family` in `group`.
///
/// Starts from the group's shortest value and drops its last character until
/// no row disagrees. A group without values gets the empty prefix.
pub fn find_prefix(store: &Store, family: UrlFamily, group: Group<'_>) -> Result<String, StoreError> {
    let Some(mut candidate) = store.shortest_nonnull(family.columns(), group)? else {
        return Ok(String::new());
    };

    'search: while !candidate.is_empty() {
        for column in family.columns() {
            if store.exists_non_matching(*column, group, &candidate)? {
                candidate.pop();
                continue 'search;
            }
        }
        break;
    }

    Ok(candidate)
}

/// Absolute prefixes of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPrefix {
    pub stream: String,
    pub web: String,
}

impl GroupPrefix {
    fn compute(store: &Store, group: Group<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            stream: find_prefix(store, UrlFamily::Stream, group)?,
            web: find_prefix(store, UrlFamily::Web, group)?,
        })
    }
}

/// Prefixes for every channel and every `(channel, topic)` in the store.
#[derive(Debug, Default)]
pub struct PrefixTable {
    channels: FxHashMap<String, GroupPrefix>,
    topics: FxHashMap<(String, String), GroupPrefix>,
}

impl PrefixTable {
    pub fn compute(store: &Store) -> Result<Self, StoreError> {
        let mut table = Self::default();

        for channel in store.distinct_channels()? {
            let prefix = GroupPrefix::compute(store, Group::Channel(&channel))?;
            debug!(channel = %channel, stream = %prefix.stream, web = %prefix.web, "Channel prefixes");

            for topic in store.distinct_topics(&channel)? {
                let group = Group::Topic {
                    channel: &channel,
                    topic: &topic,
                };
                let topic_prefix = GroupPrefix::compute(store, group)?;
                table.topics.insert((channel.clone(), topic), topic_prefix);
            }

            table.channels.insert(channel, prefix);
        }

        Ok(table)
    }

    pub fn channel(&self, channel: &str) -> Option<&GroupPrefix> {
        self.channels.get(channel)
    }

    pub fn topic(&self, channel: &str, topic: &str) -> Option<&GroupPrefix> {
        self.topics.get(&(channel.to_string(), topic.to_string()))
    }
}

/// The topic prefix with the channel prefix removed. Empty when the topic has
/// no values of its own.
fn relative(topic_prefix: &str, channel_prefix: &str) -> String {
    topic_prefix
        .strip_prefix(channel_prefix)
        .unwrap_or_default()
        .to_string()
}

fn strip(url: Option<&str>, prefix: &str) -> String {
    match url {
        Some(url) => url.strip_prefix(prefix).unwrap_or(url).to_string(),
        None => String::new(),
    }
}

/// Turns ordered records into compressed rows, remembering the previous row.
#[derive(Default)]
pub struct RowCompressor {
    channel: Option<String>,
    topic: Option<String>,
    title: Option<String>,
}

impl RowCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compress(&mut self, record: &StreamRecord, prefixes: &PrefixTable) -> Vec<String> {
        let channel_changed = self.channel.as_deref() != Some(record.channel.as_str());
        let topic_changed = channel_changed || self.topic.as_deref() != Some(record.topic.as_str());

        let channel_prefix = prefixes.channel(&record.channel).cloned().unwrap_or_default();
        let topic_prefix = prefixes
            .topic(&record.channel, &record.topic)
            .cloned()
            .unwrap_or_default();

        let topic_stream = relative(&topic_prefix.stream, &channel_prefix.stream);
        let topic_web = relative(&topic_prefix.web, &channel_prefix.web);
        let full_stream = format!("{}{}", channel_prefix.stream, topic_stream);
        let full_web = format!("{}{}", channel_prefix.web, topic_web);

        let channel = collapse(&mut self.channel, &record.channel);
        let topic = collapse(&mut self.topic, &record.topic);
        let title = collapse(&mut self.title, &record.title);

        let (channel_stream_cell, channel_web_cell) = if channel_changed {
            (channel_prefix.stream, channel_prefix.web)
        } else {
            (String::new(), String::new())
        };
        let (topic_stream_cell, topic_web_cell) = if topic_changed {
            (topic_stream, topic_web)
        } else {
            (String::new(), String::new())
        };

        vec![
            channel,
            channel_stream_cell,
            channel_web_cell,
            topic,
            topic_stream_cell,
            topic_web_cell,
            title,
            record.date.clone(),
            record.time.clone(),
            record.duration.clone(),
            record.description.clone(),
            strip(record.url_web.as_deref(), &full_web),
            strip(record.url_large.as_deref(), &full_stream),
            strip(record.url_medium.as_deref(), &full_stream),
            strip(record.url_small.as_deref(), &full_stream),
        ]
    }
}

/// Empty when `value` repeats the previous one, otherwise `value`.
fn collapse(previous: &mut Option<String>, value: &str) -> String {
    if previous.as_deref() == Some(value) {
        String::new()
    } else {
        *previous = Some(value.to_string());
        value.to_string()
    }
}

/// Writes the whole store as compressed CSV (UTF-8, no header), one row per
/// record in [`COLUMNS`] order, sorted by `(channel, topic, title)`.
///
/// Every channel and every `(channel, topic)` gets the longest prefix shared by
/// its URLs, once for `url_web` and once for the stream columns. The topic
/// prefix is written relative to the channel prefix, and URL cells hold what
/// follows both. `channel`, `topic` and `title` are left empty when equal to
/// the previous row; channel prefix cells are only written when the channel
/// changes, topic prefix cells when the channel or topic changes.
///
/// Returns the number of rows written.
pub fn export_csv<W: Write>(store: &Store, out: W) -> Result<u64> {
    let prefixes = PrefixTable::compute(store).context("Failed to compute URL prefixes")?;
    let records = store
        .ordered_records()
        .context("Failed to read stream records")?;

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::with_capacity(CSV_BUFFER_SIZE, out));
    let mut compressor = RowCompressor::new();
    let mut rows = 0u64;

    for record in &records {
        writer.write_record(compressor.compress(record, &prefixes))?;
        rows += 1;
    }

    writer.flush()?;
    info!(rows, "Exported stream records");
    Ok(rows)
}

pub fn export_to_path(store: &Store, path: &Path) -> Result<u64> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    export_csv(store, file).with_context(|| format!("Failed to export to {}", path.display()))
}

use crate::config::CSV_BUFFER_SIZE;
use crate::export::COLUMNS;
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

/// One exported row with collapsed cells filled in and URLs restored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpandedRow {
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

#[derive(Default)]
struct DecodeState {
    channel: String,
    topic: String,
    title: String,
    channel_stream: String,
    channel_web: String,
    topic_stream: String,
    topic_web: String,
    block: usize,
}

/// A decoded row before its `(channel, topic)` block is known to be complete.
struct PendingRow {
    row: ExpandedRow,
    block: usize,
    /// Web URL made of the prefix cells alone, for a row whose web suffix is empty
    web_from_prefix: Option<String>,
}

impl DecodeState {
    fn apply(&mut self, record: &StringRecord) -> PendingRow {
        let cell = |i: usize| record.get(i).unwrap_or_default();

        let new_channel = !cell(0).is_empty();
        let new_topic = new_channel || !cell(3).is_empty();

        if new_channel {
            self.channel = cell(0).to_string();
            self.channel_stream = cell(1).to_string();
            self.channel_web = cell(2).to_string();
        }
        if !cell(3).is_empty() {
            self.topic = cell(3).to_string();
        }
        if new_topic {
            self.topic_stream = cell(4).to_string();
            self.topic_web = cell(5).to_string();
            self.block += 1;
        }
        if !cell(6).is_empty() {
            self.title = cell(6).to_string();
        }

        let restore = |suffix: &str, channel: &str, topic: &str| {
            (!suffix.is_empty()).then(|| format!("{channel}{topic}{suffix}"))
        };

        let web_from_prefix = (new_topic && !cell(5).is_empty() && cell(11).is_empty())
            .then(|| format!("{}{}", self.channel_web, self.topic_web));

        PendingRow {
            row: ExpandedRow {
                channel: self.channel.clone(),
                topic: self.topic.clone(),
                title: self.title.clone(),
                date: cell(7).to_string(),
                time: cell(8).to_string(),
                duration: cell(9).to_string(),
                description: cell(10).to_string(),
                url_web: restore(cell(11), &self.channel_web, &self.topic_web),
                url_large: restore(cell(12), &self.channel_stream, &self.topic_stream),
                url_medium: restore(cell(13), &self.channel_stream, &self.topic_stream),
                url_small: restore(cell(14), &self.channel_stream, &self.topic_stream),
            },
            block: self.block,
            web_from_prefix,
        }
    }
}

/// Decodes a compressed export into full rows.
///
/// An empty URL cell normally reads as absent. The exception is a topic with a
/// single row: its topic web prefix is that row's whole web URL, so a non-empty
/// topic web prefix cell with an empty suffix restores the URL. Stream URLs of
/// such a row stay ambiguous, since the three stream columns share one prefix
/// and nothing tells which column a fully absorbed URL belonged to; they read
/// as absent.
pub fn decode_rows<R: Read>(input: R) -> Result<Vec<ExpandedRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(BufReader::with_capacity(CSV_BUFFER_SIZE, input));
    let mut state = DecodeState::default();
    let mut pending = Vec::new();

    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", line + 1))?;
        if record.len() != COLUMNS.len() {
            bail!(
                "Row {} has {} columns, expected {}",
                line + 1,
                record.len(),
                COLUMNS.len()
            );
        }
        pending.push(state.apply(&record));
    }

    let mut block_sizes: FxHashMap<usize, usize> = FxHashMap::default();
    for row in &pending {
        *block_sizes.entry(row.block).or_default() += 1;
    }

    Ok(pending
        .into_iter()
        .map(|mut entry| {
            if block_sizes.get(&entry.block) == Some(&1) {
                if let Some(url) = entry.web_from_prefix {
                    entry.row.url_web = Some(url);
                }
            }
            entry.row
        })
        .collect())
}

/// Writes the decoded rows of `input` as a plain CSV with a header.
pub fn expand_file(input: &Path, output: &Path) -> Result<usize> {
    let file = File::open(input)
        .with_context(|| format!("Failed to open compressed export: {}", input.display()))?;
    let rows = decode_rows(file)?;

    let out = File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    write_rows(&rows, out)?;

    info!(rows = rows.len(), output = %output.display(), "Expanded export");
    Ok(rows.len())
}

pub fn write_rows<W: Write>(rows: &[ExpandedRow], out: W) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(BufWriter::with_capacity(CSV_BUFFER_SIZE, out));
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

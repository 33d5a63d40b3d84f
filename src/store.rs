use crate::error::StoreError;
use crate::models::StreamRecord;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::info;

const SCHEMA: &str = "
    CREATE TABLE streams (
        source_url TEXT PRIMARY KEY,
        channel TEXT NOT NULL,
        topic TEXT NOT NULL,
        title TEXT NOT NULL,
        date TEXT,
        time TEXT,
        duration TEXT,
        description TEXT,
        url_web TEXT,
        url_large TEXT,
        url_medium TEXT,
        url_small TEXT
    );
    CREATE INDEX by_channel_topic_title ON streams (channel, topic, title);
    CREATE INDEX by_channel_url_web ON streams (channel, url_web);
    CREATE INDEX by_channel_topic_url_web ON streams (channel, topic, url_web);
    CREATE INDEX by_channel_url_large ON streams (channel, url_large);
    CREATE INDEX by_channel_topic_url_large ON streams (channel, topic, url_large);
    CREATE INDEX by_channel_url_medium ON streams (channel, url_medium);
    CREATE INDEX by_channel_topic_url_medium ON streams (channel, topic, url_medium);
    CREATE INDEX by_channel_url_small ON streams (channel, url_small);
    CREATE INDEX by_channel_topic_url_small ON streams (channel, topic, url_small);
";

const INSERT_STREAM: &str = "INSERT OR IGNORE INTO streams (
        source_url, channel, topic, title, date, time, duration, description,
        url_web, url_large, url_medium, url_small
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

const SELECT_ORDERED: &str = "SELECT
        source_url, channel, topic, title, date, time, duration, description,
        url_web, url_large, url_medium, url_small
    FROM streams ORDER BY channel, topic, title, source_url";

/// Nullable URL column of the streams table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlColumn {
    Web,
    Large,
    Medium,
    Small,
}

impl UrlColumn {
    pub fn name(&self) -> &'static str {
        match self {
            UrlColumn::Web => "url_web",
            UrlColumn::Large => "url_large",
            UrlColumn::Medium => "url_medium",
            UrlColumn::Small => "url_small",
        }
    }
}

/// URL columns compressed with one shared prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlFamily {
    Web,
    Stream,
}

impl UrlFamily {
    pub fn columns(&self) -> &'static [UrlColumn] {
        match self {
            UrlFamily::Web => &[UrlColumn::Web],
            UrlFamily::Stream => &[UrlColumn::Large, UrlColumn::Medium, UrlColumn::Small],
        }
    }
}

/// Rows sharing a channel, or a channel and topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group<'a> {
    Channel(&'a str),
    Topic { channel: &'a str, topic: &'a str },
}

impl<'a> Group<'a> {
    fn condition(&self) -> &'static str {
        match self {
            Group::Channel(_) => "channel = ?1",
            Group::Topic { .. } => "channel = ?1 AND topic = ?2",
        }
    }

    fn params(&self) -> Vec<&'a str> {
        match *self {
            Group::Channel(channel) => vec![channel],
            Group::Topic { channel, topic } => vec![channel, topic],
        }
    }
}

/// In-memory SQLite table of stream records keyed by source URL.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Inserts the batch in one transaction; records whose source URL is
    /// already stored are skipped. Any error rolls the whole batch back.
    ///
    /// Returns the number of rows actually inserted.
    pub fn insert_many<'r, I>(&mut self, records: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = &'r StreamRecord>,
    {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        let mut seen = 0;
        {
            let mut stmt = tx.prepare(INSERT_STREAM)?;
            for r in records {
                seen += 1;
                inserted += stmt.execute(params![
                    r.source_url,
                    r.channel,
                    r.topic,
                    r.title,
                    r.date,
                    r.time,
                    r.duration,
                    r.description,
                    r.url_web,
                    r.url_large,
                    r.url_medium,
                    r.url_small,
                ])?;
            }
        }
        tx.commit()?;
        self.conn.execute_batch("ANALYZE")?;

        info!(inserted, ignored = seen - inserted, "Stored stream records");
        Ok(inserted)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM streams", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, source_url: &str) -> Result<Option<StreamRecord>, StoreError> {
        let sql = "SELECT
                source_url, channel, topic, title, date, time, duration, description,
                url_web, url_large, url_medium, url_small
            FROM streams WHERE source_url = ?1";
        Ok(self
            .conn
            .query_row(sql, [source_url], row_to_record)
            .optional()?)
    }

    pub fn distinct_channels(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT channel FROM streams ORDER BY channel")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn distinct_topics(&self, channel: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT topic FROM streams WHERE channel = ?1 ORDER BY topic")?;
        let rows = stmt.query_map([channel], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Shortest non-null value of any of `columns` within `group`; ties go to
    /// the lexicographically smallest value.
    pub fn shortest_nonnull(
        &self,
        columns: &[UrlColumn],
        group: Group<'_>,
    ) -> Result<Option<String>, StoreError> {
        let mut shortest: Option<String> = None;

        for column in columns {
            let sql = format!(
                "SELECT {col} FROM streams WHERE {cond} AND {col} IS NOT NULL
                 ORDER BY length({col}), {col} LIMIT 1",
                col = column.name(),
                cond = group.condition(),
            );
            let value: Option<String> = self
                .conn
                .query_row(&sql, params_from_iter(group.params()), |row| row.get(0))
                .optional()?;

            if let Some(value) = value {
                let better = match &shortest {
                    Some(current) => {
                        (value.chars().count(), &value) < (current.chars().count(), current)
                    }
                    None => true,
                };
                if better {
                    shortest = Some(value);
                }
            }
        }

        Ok(shortest)
    }

    /// Whether some row in `group` has a non-null `column` value that does
    /// not start with `prefix`. The prefix is compared literally.
    pub fn exists_non_matching(
        &self,
        column: UrlColumn,
        group: Group<'_>,
        prefix: &str,
    ) -> Result<bool, StoreError> {
        let param = group.params().len() + 1;
        let sql = format!(
            "SELECT EXISTS (
                SELECT 1 FROM streams WHERE {cond} AND {col} IS NOT NULL
                AND substr({col}, 1, length(?{param})) <> ?{param}
            )",
            col = column.name(),
            cond = group.condition(),
        );

        let mut values = group.params();
        values.push(prefix);
        let exists: bool = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(exists)
    }

    /// Every record, ordered by channel, topic and title.
    pub fn ordered_records(&self) -> Result<Vec<StreamRecord>, StoreError> {
        let mut stmt = self.conn.prepare(SELECT_ORDERED)?;
        let rows = stmt.query_map([], row_to_record)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StreamRecord> {
    Ok(StreamRecord {
        source_url: row.get(0)?,
        channel: row.get(1)?,
        topic: row.get(2)?,
        title: row.get(3)?,
        date: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        time: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        duration: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        url_web: row.get(8)?,
        url_large: row.get(9)?,
        url_medium: row.get(10)?,
        url_small: row.get(11)?,
    })
}

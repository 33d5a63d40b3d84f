use crate::config::{
    HarvestConfig, DAY_INDEX_PATH, DAY_LINK_PATTERN, LETTER_INDEX_PATH, LETTER_LINK_PATTERN,
};
use crate::error::ScrapeError;
use crate::extract;
use crate::fetch::Fetch;
use crate::models::{
    BroadcastEntry, IndexUrl, SeedIndex, SeedKind, ShowEntry, StreamRecord,
};
use crate::pool::{Stage, WorkerPool};
use crate::stats::HarvestStats;
use anyhow::Result;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Letter index first, then day index.
pub fn seed_indexes(base_url: &str) -> Vec<SeedIndex> {
    vec![
        SeedIndex {
            kind: SeedKind::Letters,
            url: crate::config::absolutize(base_url, LETTER_INDEX_PATH),
            link_pattern: LETTER_LINK_PATTERN.to_string(),
        },
        SeedIndex {
            kind: SeedKind::Days,
            url: crate::config::absolutize(base_url, DAY_INDEX_PATH),
            link_pattern: DAY_LINK_PATTERN.to_string(),
        },
    ]
}

pub struct SeedStage {
    pub base_url: String,
}

#[async_trait]
impl<F: Fetch + 'static> Stage<F> for SeedStage {
    type Input = SeedIndex;
    type Output = Vec<IndexUrl>;

    fn name(&self) -> &'static str {
        "seed"
    }

    fn source_url<'a>(&self, input: &'a SeedIndex) -> &'a str {
        &input.url
    }

    async fn run(&self, fetcher: &mut F, seed: &SeedIndex) -> Result<Vec<IndexUrl>, ScrapeError> {
        info!(kind = seed.kind.label(), url = %seed.url, "Scraping seed index");
        let page = fetcher.fetch(&seed.url).await?;
        let links = extract::index_links(&page, &self.base_url, &seed.link_pattern)?;
        Ok(links.into_iter().map(IndexUrl).collect())
    }

    /// There is nothing to fall back to when a seed page is lost.
    fn report_failure(&self, error: &ScrapeError) {
        error!(url = error.url(), error = %error, "Failed to scrape seed index");
    }
}

pub struct ShowStage {
    pub base_url: String,
}

#[async_trait]
impl<F: Fetch + 'static> Stage<F> for ShowStage {
    type Input = IndexUrl;
    type Output = Vec<ShowEntry>;

    fn name(&self) -> &'static str {
        "shows"
    }

    fn source_url<'a>(&self, input: &'a IndexUrl) -> &'a str {
        &input.0
    }

    async fn run(&self, fetcher: &mut F, index: &IndexUrl) -> Result<Vec<ShowEntry>, ScrapeError> {
        debug!(url = %index.0, "Scraping shows");
        let page = fetcher.fetch(&index.0).await?;
        Ok(extract::show_entries(&page, &self.base_url))
    }
}

pub struct BroadcastStage {
    pub base_url: String,
}

#[async_trait]
impl<F: Fetch + 'static> Stage<F> for BroadcastStage {
    type Input = ShowEntry;
    type Output = Vec<BroadcastEntry>;

    fn name(&self) -> &'static str {
        "broadcasts"
    }

    fn source_url<'a>(&self, input: &'a ShowEntry) -> &'a str {
        &input.url
    }

    async fn run(&self, fetcher: &mut F, show: &ShowEntry) -> Result<Vec<BroadcastEntry>, ScrapeError> {
        debug!(url = %show.url, "Scraping broadcasts");
        let page = fetcher.fetch(&show.url).await?;
        Ok(extract::broadcast_entries(&page, &self.base_url, &show.title))
    }
}

/// Broadcast page, then its asset feed. Both fetches belong to one task.
pub struct StreamStage {
    pub base_url: String,
}

#[async_trait]
impl<F: Fetch + 'static> Stage<F> for StreamStage {
    type Input = BroadcastEntry;
    type Output = StreamRecord;

    fn name(&self) -> &'static str {
        "streams"
    }

    fn source_url<'a>(&self, input: &'a BroadcastEntry) -> &'a str {
        &input.url
    }

    async fn run(&self, fetcher: &mut F, broadcast: &BroadcastEntry) -> Result<StreamRecord, ScrapeError> {
        debug!(url = %broadcast.url, "Scraping streams");
        let page = fetcher.fetch(&broadcast.url).await?;
        let feed_url = extract::player_feed_url(&page, &self.base_url, &broadcast.url)?;

        debug!(url = %feed_url, "Fetching asset feed");
        let feed = fetcher.fetch(&feed_url).await?;
        let metadata = extract::parse_feed(&feed, &feed_url)?;

        Ok(StreamRecord::from_feed(broadcast.clone(), feed_url, metadata))
    }
}

/// Successful outputs of one stage, in input order, plus its failure count.
pub struct StageReport<T> {
    pub outputs: Vec<T>,
    pub failed: u64,
}

/// Runs one stage to completion on a fresh pool of `workers` fetchers.
pub async fn run_stage<S, F, M>(
    stage: S,
    workers: usize,
    inputs: Vec<S::Input>,
    make_fetcher: &M,
    progress: bool,
) -> Result<StageReport<S::Output>>
where
    S: Stage<F>,
    F: Fetch + 'static,
    M: Fn() -> F,
{
    let stage = Arc::new(stage);
    let name = stage.name();
    let tasks = inputs.len();
    let start = Instant::now();

    let mut pool = WorkerPool::new(workers, |_| make_fetcher());
    let pb = if progress {
        make_progress_bar(tasks as u64, name)
    } else {
        ProgressBar::hidden()
    };

    let results = pool.run(stage.clone(), inputs, &pb).await?;
    pb.finish_and_clear();

    let mut outputs = Vec::with_capacity(results.len());
    let mut failed = 0u64;
    for result in results {
        match result {
            Ok(output) => outputs.push(output),
            Err(e) => {
                failed += 1;
                stage.report_failure(&e);
            }
        }
    }

    info!(
        stage = name,
        workers = pool.size(),
        tasks,
        failed,
        duration_secs = start.elapsed().as_secs_f64(),
        "Stage complete"
    );

    Ok(StageReport { outputs, failed })
}

/// Expands the two seed indexes into stream records: seed pages to index
/// pages, index pages to shows, shows to broadcasts, broadcasts to records.
///
/// Every stage is a barrier. Its whole output is collected, in input order,
/// before the next stage starts on its own pool. `make_fetcher` is called once
/// per pool worker. Individual fetch or
/// extraction failures are logged and dropped; the run always completes with
/// whatever could be collected.
pub async fn harvest<F, M>(
    config: &HarvestConfig,
    make_fetcher: M,
    stats: &HarvestStats,
) -> Result<Vec<StreamRecord>>
where
    F: Fetch + 'static,
    M: Fn() -> F,
{
    let base_url = config.base_url.clone();

    let seeds = run_stage(
        SeedStage { base_url: base_url.clone() },
        config.seed_workers,
        seed_indexes(&base_url),
        &make_fetcher,
        config.progress,
    )
    .await?;
    stats.add_seed_failures(seeds.failed);
    let mut index_urls: Vec<IndexUrl> = seeds.outputs.into_iter().flatten().collect();
    if let Some(limit) = config.index_limit {
        index_urls.truncate(limit);
    }
    stats.add_index_urls(index_urls.len() as u64);
    info!(count = index_urls.len(), "Collected index pages");

    let shows = run_stage(
        ShowStage { base_url: base_url.clone() },
        config.show_workers,
        index_urls,
        &make_fetcher,
        config.progress,
    )
    .await?;
    stats.add_show_failures(shows.failed);
    let shows: Vec<ShowEntry> = shows.outputs.into_iter().flatten().collect();
    stats.add_shows(shows.len() as u64);
    info!(count = shows.len(), "Collected shows");

    let broadcasts = run_stage(
        BroadcastStage { base_url: base_url.clone() },
        config.broadcast_workers,
        shows,
        &make_fetcher,
        config.progress,
    )
    .await?;
    stats.add_broadcast_failures(broadcasts.failed);
    let broadcasts: Vec<BroadcastEntry> = broadcasts.outputs.into_iter().flatten().collect();
    stats.add_broadcasts(broadcasts.len() as u64);
    info!(count = broadcasts.len(), "Collected broadcasts");

    let streams = run_stage(
        StreamStage { base_url },
        config.stream_workers,
        broadcasts,
        &make_fetcher,
        config.progress,
    )
    .await?;
    stats.add_stream_failures(streams.failed);
    stats.add_streams(streams.outputs.len() as u64);
    info!(count = streams.outputs.len(), "Collected streams");

    Ok(streams.outputs)
}

fn make_progress_bar(total: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(&format!(
        "    {{spinner:.cyan}} {label:<11} [{{bar:30.cyan/blue}}] {{pos}}/{{len}} pages"
    )) {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BASE_URL;

    #[test]
    fn seeds_are_letters_then_days() {
        let seeds = seed_indexes(BASE_URL);
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].kind, SeedKind::Letters);
        assert_eq!(
            seeds[0].url,
            "http://www.mdr.de/mediathek/fernsehen/a-z/index.html"
        );
        assert_eq!(seeds[1].kind, SeedKind::Days);
        assert_eq!(seeds[1].url, "http://www.mdr.de/mediathek/fernsehen/index.html");
    }

    #[test]
    fn progress_bar_has_length() {
        let pb = make_progress_bar(7, "shows");
        assert_eq!(pb.length(), Some(7));
        pb.finish_and_clear();
    }
}

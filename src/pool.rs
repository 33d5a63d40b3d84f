use crate::error::ScrapeError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use indicatif::ProgressBar;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

/// One step of the expansion pipeline, run once per input item.
///
/// `W` is the per-worker resource the pool lends to the task (an HTTP
/// session in production).
#[async_trait]
pub trait Stage<W>: Send + Sync + 'static {
    type Input: Send + Sync + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    /// URL the task works on, for logs and panic reports
    fn source_url<'a>(&self, input: &'a Self::Input) -> &'a str;

    async fn run(&self, worker: &mut W, input: &Self::Input) -> Result<Self::Output, ScrapeError>;

    fn report_failure(&self, error: &ScrapeError) {
        warn!(stage = self.name(), url = error.url(), error = %error, "Task failed");
    }
}

type TaskHandle<W, T> = JoinHandle<(usize, W, Result<T, ScrapeError>)>;

/// Bounded worker pool.
///
/// Holds one resource per worker; a task takes a resource while it runs and
/// hands it back when done, so at most `size` tasks are in flight and no
/// resource is ever used by two tasks at once.
pub struct WorkerPool<W> {
    idle: Vec<W>,
    size: usize,
}

impl<W: Send + 'static> WorkerPool<W> {
    pub fn new(size: usize, make_worker: impl FnMut(usize) -> W) -> Self {
        let size = size.max(1);
        Self {
            idle: (0..size).map(make_worker).collect(),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `stage` over every input and returns one result per input, in
    /// submission order regardless of completion order.
    ///
    /// A task failure (including a panic) only affects its own slot.
    pub async fn run<S>(
        &mut self,
        stage: Arc<S>,
        inputs: Vec<S::Input>,
        pb: &ProgressBar,
    ) -> Result<Vec<Result<S::Output, ScrapeError>>>
    where
        S: Stage<W>,
    {
        let total = inputs.len();
        let mut slots: Vec<Option<Result<S::Output, ScrapeError>>> =
            (0..total).map(|_| None).collect();
        let mut pending = inputs.into_iter().enumerate();
        let mut in_flight: FuturesUnordered<TaskHandle<W, S::Output>> = FuturesUnordered::new();

        loop {
            while let Some(worker) = self.idle.pop() {
                match pending.next() {
                    Some((index, input)) => {
                        in_flight.push(spawn_task(stage.clone(), worker, index, input));
                    }
                    None => {
                        self.idle.push(worker);
                        break;
                    }
                }
            }

            let Some(joined) = in_flight.next().await else {
                break;
            };
            let (index, worker, result) = joined.context("Task join error")?;
            self.idle.push(worker);
            slots[index] = Some(result);
            pb.inc(1);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

fn spawn_task<W, S>(stage: Arc<S>, mut worker: W, index: usize, input: S::Input) -> TaskHandle<W, S::Output>
where
    W: Send + 'static,
    S: Stage<W>,
{
    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(stage.run(&mut worker, &input))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Panicked {
                url: stage.source_url(&input).to_string(),
            }),
        };
        (index, worker, result)
    })
}

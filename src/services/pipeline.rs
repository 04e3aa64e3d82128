use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};

use crate::config::Config;
use crate::services::parser::{self, ParseStats};
use crate::services::writer::{self, AttemptSink, WriteStats};
use crate::utils::error::EtlResult;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub lines_read: u64,
    pub records_emitted: u64,
    pub lines_skipped: u64,
    pub inserts_succeeded: u64,
    pub inserts_failed: u64,
}

impl RunReport {
    fn from_stats(parse: ParseStats, write: WriteStats) -> Self {
        Self {
            lines_read: parse.lines_read,
            records_emitted: parse.records_emitted,
            lines_skipped: parse.lines_skipped,
            inserts_succeeded: write.inserts_succeeded,
            inserts_failed: write.inserts_failed,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines read, {} records emitted, {} lines skipped, {} inserted, {} failed inserts",
            self.lines_read,
            self.records_emitted,
            self.lines_skipped,
            self.inserts_succeeded,
            self.inserts_failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Draining,
    Done,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub channel_capacity: usize,
    pub remove_source: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            remove_source: false,
        }
    }
}

impl From<&Config> for RunOptions {
    fn from(config: &Config) -> Self {
        Self {
            channel_capacity: config.channel_capacity,
            remove_source: config.remove_source,
        }
    }
}

fn transition(state: &mut RunState, next: RunState) {
    tracing::debug!("Ingest run {:?} -> {:?}", state, next);
    *state = next;
}

// Only an unreadable source fails the run. Line and insert failures are
// counted in the report.
pub async fn run_once<S: AttemptSink>(
    source: &Path,
    sink: &S,
    options: &RunOptions,
) -> EtlResult<RunReport> {
    let mut state = RunState::Idle;
    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));

    let path = source.to_path_buf();
    let remove_source = options.remove_source;
    let mut producer =
        tokio::spawn(async move { parser::ingest_file(&path, tx, remove_source).await });
    transition(&mut state, RunState::Running);

    let consumer = writer::write_attempts(sink, rx);
    tokio::pin!(consumer);

    let (parse_result, write_stats) = tokio::select! {
        parsed = &mut producer => {
            transition(&mut state, RunState::Draining);
            (parsed, consumer.await)
        }
        written = &mut consumer => (producer.await, written),
    };
    transition(&mut state, RunState::Done);

    let parse_stats = parse_result??;
    Ok(RunReport::from_stats(parse_stats, write_stats))
}

// Overlapping calls to `run` wait on `in_flight`.
pub struct Pipeline<S> {
    source: PathBuf,
    sink: S,
    options: RunOptions,
    in_flight: Mutex<()>,
}

impl<S: AttemptSink> Pipeline<S> {
    pub fn new(source: impl Into<PathBuf>, sink: S, options: RunOptions) -> Self {
        Self {
            source: source.into(),
            sink,
            options,
            in_flight: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn run(&self) -> EtlResult<RunReport> {
        let _guard = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!("Previous ingest run still active, waiting for it to finish");
                self.in_flight.lock().await
            }
        };

        tracing::info!("Ingest run started for {}", self.source.display());

        run_once(&self.source, &self.sink, &self.options).await
    }
}

pub type SharedPipeline<S> = Arc<Pipeline<S>>;

// Field positions are measured from the marker token. On the standard
// sshd and PAM layouts the username lands on field 9 (failures) and
// field 11 (sessions).

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::models::login_attempt::LoginAttempt;
use crate::services::timestamp;
use crate::utils::error::{EtlError, EtlResult, LineParseError};

pub const FAILURE_MARKER: &str = "Failed";
pub const SESSION_MARKER: &str = "session opened";

const MONTH_FIELD: usize = 0;
const DAY_FIELD: usize = 1;
const CLOCK_FIELD: usize = 2;

// Failed <method> for <user>
const FAILURE_USER_OFFSET: usize = 3;
// Failed <method> for invalid user <user>
const FAILURE_INVALID_USER_OFFSET: usize = 5;
// session opened for user <user>(uid=N)
const SESSION_USER_OFFSET: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Failure,
    Session,
    Irrelevant,
}

pub fn classify_line(line: &str) -> LineKind {
    if line.contains(FAILURE_MARKER) {
        LineKind::Failure
    } else if line.to_ascii_lowercase().contains(SESSION_MARKER) {
        LineKind::Session
    } else {
        LineKind::Irrelevant
    }
}

fn field<'a>(fields: &[&'a str], index: usize) -> Result<&'a str, LineParseError> {
    fields
        .get(index)
        .copied()
        .ok_or(LineParseError::MissingField {
            index: index + 1,
            found: fields.len(),
        })
}

fn line_timestamp(fields: &[&str]) -> Result<String, LineParseError> {
    timestamp::reconstruct(
        field(fields, MONTH_FIELD)?,
        field(fields, DAY_FIELD)?,
        field(fields, CLOCK_FIELD)?,
    )
}

fn failure_username<'a>(fields: &[&'a str]) -> Result<&'a str, LineParseError> {
    let marker = fields
        .iter()
        .position(|f| f.contains(FAILURE_MARKER))
        .unwrap_or(fields.len());

    let invalid_user = fields.get(marker + FAILURE_USER_OFFSET) == Some(&"invalid")
        && fields.get(marker + FAILURE_USER_OFFSET + 1) == Some(&"user");

    if invalid_user {
        field(fields, marker + FAILURE_INVALID_USER_OFFSET)
    } else {
        field(fields, marker + FAILURE_USER_OFFSET)
    }
}

fn session_username<'a>(fields: &[&'a str]) -> Result<&'a str, LineParseError> {
    let marker = fields
        .windows(2)
        .position(|pair| {
            pair[0].eq_ignore_ascii_case("session") && pair[1].eq_ignore_ascii_case("opened")
        })
        .unwrap_or(fields.len());

    let raw = field(fields, marker + SESSION_USER_OFFSET)?;
    match raw.split('(').next() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(LineParseError::EmptyUsername(raw.to_string())),
    }
}

// Ok(None) for lines that are not login events.
pub fn parse_line(line: &str) -> Result<Option<LoginAttempt>, LineParseError> {
    let kind = classify_line(line);
    if kind == LineKind::Irrelevant {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();

    let attempt = match kind {
        LineKind::Failure => {
            let username = failure_username(&fields)?;
            LoginAttempt::failed(username.to_string(), line_timestamp(&fields)?)
        }
        LineKind::Session => {
            let username = session_username(&fields)?;
            LoginAttempt::succeeded(username.to_string(), line_timestamp(&fields)?)
        }
        LineKind::Irrelevant => return Ok(None),
    };

    Ok(Some(attempt))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub lines_read: u64,
    pub records_emitted: u64,
    pub lines_skipped: u64,
    pub completed: bool,
}

// `completed` is false when the receiver went away before end of input.
pub async fn ingest_reader<R>(reader: R, tx: mpsc::Sender<LoginAttempt>) -> EtlResult<ParseStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ParseStats::default();
    let mut lines = reader.split(b'\n');

    while let Some(raw) = lines.next_segment().await.map_err(|e| EtlError::SourceUnavailable {
        path: Default::default(),
        source: e,
    })? {
        stats.lines_read += 1;
        let line = String::from_utf8_lossy(&raw);

        match parse_line(&line) {
            Ok(Some(attempt)) => {
                if tx.send(attempt).await.is_err() {
                    tracing::warn!("Writer closed the channel, stopping ingest early");
                    return Ok(stats);
                }
                stats.records_emitted += 1;
            }
            Ok(None) => {}
            Err(e) => {
                stats.lines_skipped += 1;
                tracing::warn!("Skipping line {}: {}", stats.lines_read, e);
            }
        }
    }

    stats.completed = true;
    Ok(stats)
}

pub async fn ingest_file(
    path: &Path,
    tx: mpsc::Sender<LoginAttempt>,
    remove_after_read: bool,
) -> EtlResult<ParseStats> {
    let file = File::open(path)
        .await
        .map_err(|e| EtlError::SourceUnavailable {
            path: path.to_path_buf(),
            source: e,
        })?;

    tracing::info!("Reading log source {}", path.display());

    let stats = ingest_reader(BufReader::new(file), tx)
        .await
        .map_err(|e| match e {
            EtlError::SourceUnavailable { source, .. } => EtlError::SourceUnavailable {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

    if remove_after_read && !stats.completed {
        tracing::warn!(
            "Keeping log source {}: only {} lines were read",
            path.display(),
            stats.lines_read
        );
    } else if remove_after_read {
        match tokio::fs::remove_file(path).await {
            Ok(_) => tracing::info!("Removed consumed log source {}", path.display()),
            Err(e) => tracing::warn!("Failed to remove log source {}: {}", path.display(), e),
        }
    }

    Ok(stats)
}

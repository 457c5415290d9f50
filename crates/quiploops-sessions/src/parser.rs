use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};

use crate::types::{CycleRecord, Session, SessionEnd, SessionLine, SessionStart, SessionSummary};

const TOPIC_PREVIEW_CHARS: usize = 100;

fn session_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn preview(line: &str) -> String {
    line.chars().take(100).collect()
}

/// Parse a single JSONL file into a fully-loaded Session.
pub fn parse_session(path: &Path) -> Result<Session> {
    let file =
        File::open(path).with_context(|| format!("Failed to open session file: {:?}", path))?;
    let reader = BufReader::new(file);

    let mut start: Option<SessionStart> = None;
    let mut cycles: Vec<CycleRecord> = Vec::new();
    let mut end: Option<SessionEnd> = None;

    for line in reader.lines() {
        let line = line.with_context(|| "Failed to read line from session file")?;
        if line.trim().is_empty() {
            continue;
        }

        let session_line: SessionLine = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse session line: {}", preview(&line)))?;

        match session_line {
            SessionLine::SessionStart(s) => start = Some(s),
            SessionLine::Cycle(c) => cycles.push(c),
            SessionLine::SessionEnd(e) => end = Some(e),
        }
    }

    let start = start.with_context(|| "Session file missing session_start line")?;

    Ok(Session {
        id: session_id(path),
        start,
        cycles,
        end,
    })
}

/// Parse just enough of the file to produce a SessionSummary (fast listing).
/// Reads the first two lines for start info and the first score, then seeks
/// to the end for the final state.
pub fn parse_session_summary(path: &Path) -> Result<SessionSummary> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open session file: {:?}", path))?;

    let mut reader = BufReader::new(&mut file);
    let mut first_line = String::new();
    reader.read_line(&mut first_line)?;

    let start = match serde_json::from_str::<SessionLine>(first_line.trim())
        .with_context(|| "Failed to parse first line as session_start")?
    {
        SessionLine::SessionStart(s) => s,
        _ => anyhow::bail!("First line of session file is not session_start"),
    };

    let mut second_line = String::new();
    reader.read_line(&mut second_line)?;
    let first_score = match serde_json::from_str::<SessionLine>(second_line.trim()) {
        Ok(SessionLine::Cycle(c)) => Some(c.feedback.score()),
        _ => None,
    };

    drop(reader);
    let last_line = read_last_line(&mut file)?;

    let (cycles, final_score, duration_secs, finished) = match last_line
        .as_deref()
        .map(|l| serde_json::from_str::<SessionLine>(l.trim()))
    {
        Some(Ok(SessionLine::SessionEnd(e))) => {
            (e.cycles, e.final_score, Some(e.duration_secs), true)
        }
        Some(Ok(SessionLine::Cycle(c))) => {
            // Still running (or abandoned): the last cycle's index is the count
            (c.index, Some(c.feedback.score()), None, false)
        }
        _ => (0, None, None, false),
    };

    let topic_preview = if start.topic.chars().count() > TOPIC_PREVIEW_CHARS {
        let head: String = start.topic.chars().take(TOPIC_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        start.topic.clone()
    };

    Ok(SessionSummary {
        id: session_id(path),
        timestamp: start.timestamp,
        topic_preview,
        generator: format!("{}/{}", start.generator_provider, start.generator_model),
        evaluator: format!("{}/{}", start.evaluator_provider, start.evaluator_model),
        cycles,
        first_score,
        final_score,
        duration_secs,
        finished,
    })
}

/// Read the last non-empty line of a file by seeking from the end.
fn read_last_line(file: &mut File) -> Result<Option<String>> {
    let file_len = file.seek(SeekFrom::End(0))?;
    if file_len == 0 {
        return Ok(None);
    }

    // Read up to the last 64KB to find the last line
    let read_size = file_len.min(65536);
    file.seek(SeekFrom::End(-(read_size as i64)))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let buf = String::from_utf8_lossy(&bytes);

    let last = buf
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|s| s.to_string());

    Ok(last)
}

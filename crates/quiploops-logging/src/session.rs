use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Provider and model of both roles, as recorded in a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptModels {
    pub generator_provider: String,
    pub generator_model: String,
    pub evaluator_provider: String,
    pub evaluator_model: String,
}

/// Represents each line type in the session JSONL file.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionLine {
    SessionStart {
        timestamp: DateTime<Utc>,
        session_id: String,
        topic: String,
        #[serde(flatten)]
        models: TranscriptModels,
    },
    Cycle {
        index: usize,
        kind: String,
        artifact: String,
        feedback: serde_json::Value,
        #[serde(flatten)]
        models: TranscriptModels,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
    SessionEnd {
        cycles: usize,
        final_score: Option<u8>,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Writes session transcripts as JSONL to `<data_dir>/quiploops/sessions/`.
///
/// The file is created by the first write, so a session that never
/// starts leaves nothing behind. Write failures are ignored: a transcript
/// must never break a session.
pub struct SessionWriter {
    file: Mutex<Option<BufWriter<File>>>,
    path: PathBuf,
}

impl SessionWriter {
    /// Create a writer in the default sessions directory
    pub fn new(topic: &str) -> io::Result<Self> {
        Self::in_dir(&Self::sessions_dir()?, topic)
    }

    /// Create a writer in `dir`. The file name is the current UTC timestamp
    /// plus a short hash of the topic. Only the directory is created here.
    pub fn in_dir(dir: &Path, topic: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let now = Utc::now();
        let timestamp_str = now.format("%Y-%m-%dT%H-%M-%SZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(topic.as_bytes());
        hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        let hash = hex::encode(hasher.finalize());
        let short_hash = &hash[..6];

        let filename = format!("{}_{}.jsonl", timestamp_str, short_hash);
        let path = dir.join(filename);

        Ok(Self {
            file: Mutex::new(None),
            path,
        })
    }

    /// Returns the path to the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(&self, session_id: &str, topic: &str, models: TranscriptModels) {
        self.write_line(&SessionLine::SessionStart {
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            topic: topic.to_string(),
            models,
        });
    }

    /// Write a cycle line. Takes plain fields so this crate stays independent
    /// of the session types.
    pub fn write_cycle(
        &self,
        index: usize,
        kind: &str,
        artifact: &str,
        feedback: serde_json::Value,
        models: TranscriptModels,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    ) {
        self.write_line(&SessionLine::Cycle {
            index,
            kind: kind.to_string(),
            artifact: artifact.to_string(),
            feedback,
            models,
            duration_secs,
            timestamp,
        });
    }

    pub fn write_end(&self, cycles: usize, final_score: Option<u8>, duration_secs: f64) {
        self.write_line(&SessionLine::SessionEnd {
            cycles,
            final_score,
            duration_secs,
            timestamp: Utc::now(),
        });
    }

    fn write_line(&self, line: &SessionLine) {
        let Ok(json) = serde_json::to_string(line) else {
            return;
        };
        let Ok(mut slot) = self.file.lock() else {
            return;
        };
        if slot.is_none() {
            match File::create(&self.path) {
                Ok(file) => *slot = Some(BufWriter::new(file)),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Cannot create transcript"
                    );
                    return;
                }
            }
        }
        if let Some(writer) = slot.as_mut() {
            let _ = writeln!(writer, "{}", json);
            let _ = writer.flush();
        }
    }

    /// `<data_dir>/quiploops/sessions`
    pub fn sessions_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("quiploops").join("sessions"))
    }
}

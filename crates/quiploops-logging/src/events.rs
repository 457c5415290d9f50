use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for a refinement session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SessionStarted {
        session_id: String,
        topic: String,
        /// `provider/model`
        generator: String,
        evaluator: String,
    },
    GeneratorStarted {
        session_id: String,
        action: String,
        cycle_index: usize,
    },
    GeneratorCompleted {
        session_id: String,
        cycle_index: usize,
        chars: usize,
        /// Prompt plus completion tokens, when the provider reports them
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tokens: Option<u32>,
        duration_secs: f64,
    },
    EvaluatorStarted {
        session_id: String,
        cycle_index: usize,
        reevaluation: bool,
    },
    EvaluatorCompleted {
        session_id: String,
        cycle_index: usize,
        score: u8,
        degraded: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tokens: Option<u32>,
        duration_secs: f64,
    },
    /// Emitted once after every action, successful or not
    ActionCompleted {
        session_id: String,
        action: String,
        /// Index of the appended cycle (None when the action failed)
        cycle_index: Option<usize>,
        kind: Option<String>,
        models_used: String,
        duration_ms: u64,
        success: bool,
    },
    ActionFailed {
        session_id: String,
        action: String,
        error: String,
    },
    SessionFinished {
        session_id: String,
        cycles: usize,
        first_score: Option<u8>,
        final_score: Option<u8>,
        duration_secs: f64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for session events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    console: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            console: true,
            file_writer: None,
        }
    }

    /// Logger that renders nothing
    pub fn silent() -> Self {
        Self {
            format: LogFormat::Compact,
            console: false,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            console: true,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if !self.console {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::SessionStarted {
                topic,
                generator,
                evaluator,
                ..
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "quiploops".bold().bright_white(),
                    " ".repeat(58) + &"│".bright_blue().to_string()
                );
                for (label, value, max_len) in [
                    ("Topic:", topic.as_str(), 60),
                    ("Generator:", generator.as_str(), 56),
                    ("Evaluator:", evaluator.as_str(), 56),
                ] {
                    let _ = writeln!(
                        stderr,
                        "{}  {} {}",
                        "│".bright_blue(),
                        label.dimmed(),
                        Self::truncate_with_padding(value, max_len, 67 - label.len()).dimmed()
                    );
                }
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::GeneratorStarted {
                action,
                cycle_index,
                ..
            } => {
                let header = format!("─ Cycle {} ({}) ", cycle_index, action);
                let padding = "─".repeat(67usize.saturating_sub(header.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    header.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_cyan(),
                    "GENERATOR".bright_cyan().bold()
                );
            }
            LogEvent::GeneratorCompleted { duration_secs, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} Done ({:.1}s)",
                    "✓".bright_green(),
                    duration_secs
                );
                let _ = writeln!(stderr);
            }
            LogEvent::EvaluatorStarted {
                cycle_index,
                reevaluation,
                ..
            } => {
                if *reevaluation {
                    // No generator step, so open the cycle here
                    let header = format!("─ Cycle {} (reevaluate) ", cycle_index);
                    let padding = "─".repeat(67usize.saturating_sub(header.chars().count()));
                    let _ = writeln!(
                        stderr,
                        "{}{}{}",
                        "┌".bright_blue(),
                        header.bright_blue().bold(),
                        padding.bright_blue()
                    );
                    let _ = writeln!(stderr);
                }
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "EVALUATOR".bright_magenta().bold()
                );
            }
            LogEvent::EvaluatorCompleted {
                score,
                degraded,
                duration_secs,
                ..
            } => {
                if *degraded {
                    let _ = writeln!(
                        stderr,
                        "    {} Unparseable output, fallback score {} ({:.1}s)",
                        "⚠".bright_yellow(),
                        score,
                        duration_secs
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "    {} Score {}/100 ({:.1}s)",
                        "✓".bright_green(),
                        score,
                        duration_secs
                    );
                }
                let _ = writeln!(stderr);
            }
            LogEvent::ActionCompleted { success, .. } => {
                if *success {
                    let _ = writeln!(
                        stderr,
                        "{}",
                        "└─────────────────────────────────────────────────────────────────────┘"
                            .bright_blue()
                    );
                    let _ = writeln!(stderr);
                }
            }
            LogEvent::ActionFailed { action, error, .. } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} failed: {}",
                    "✗".bright_red(),
                    action,
                    error.bright_red()
                );
            }
            LogEvent::SessionFinished { .. } => {
                // The binary prints the history summary
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::SessionStarted {
                generator,
                evaluator,
                ..
            } => format!("[{}] session:start gen={} eval={}", timestamp, generator, evaluator),
            LogEvent::GeneratorStarted {
                action,
                cycle_index,
                ..
            } => format!("[{}] generator:start:{} {}", timestamp, cycle_index, action),
            LogEvent::GeneratorCompleted {
                cycle_index,
                tokens,
                duration_secs,
                ..
            } => format!(
                "[{}] generator:done:{}{} {:.1}s",
                timestamp,
                cycle_index,
                Self::tokens_suffix(*tokens),
                duration_secs
            ),
            LogEvent::EvaluatorStarted { cycle_index, .. } => {
                format!("[{}] evaluator:start:{}", timestamp, cycle_index)
            }
            LogEvent::EvaluatorCompleted {
                cycle_index,
                score,
                degraded,
                tokens,
                duration_secs,
                ..
            } => format!(
                "[{}] evaluator:done:{} score={}{}{} {:.1}s",
                timestamp,
                cycle_index,
                score,
                if *degraded { " degraded" } else { "" },
                Self::tokens_suffix(*tokens),
                duration_secs
            ),
            LogEvent::ActionCompleted {
                action,
                cycle_index,
                duration_ms,
                success,
                ..
            } => format!(
                "[{}] action:{}:{} {} {}ms",
                timestamp,
                action,
                cycle_index.map_or_else(|| "-".to_string(), |i| i.to_string()),
                if *success { "ok" } else { "failed" },
                duration_ms
            ),
            LogEvent::ActionFailed { action, error, .. } => {
                format!("[{}] error:{}:{}", timestamp, action, error)
            }
            LogEvent::SessionFinished {
                cycles,
                duration_secs,
                ..
            } => format!(
                "[{}] session:done:{} {:.1}s",
                timestamp, cycles, duration_secs
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    fn tokens_suffix(tokens: Option<u32>) -> String {
        tokens.map(|t| format!(" tokens={}", t)).unwrap_or_default()
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

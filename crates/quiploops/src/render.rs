//! Terminal rendering of cycles, configuration and session summaries.

use colored::{ColoredString, Colorize};

use quiploops_agent::Role;
use quiploops_core::{Cycle, History, SessionConfig};
use quiploops_critic::MAX_SCORE;

const BAR_WIDTH: usize = 20;

/// Word pairs compared before a diff gives up and replaces everything
const MAX_DIFF_CELLS: usize = 250_000;

/// One run of words in a revision diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSpan {
    Kept(String),
    Removed(String),
    Added(String),
}

/// Fixed-width bar for a 0-100 score
pub fn score_bar(score: u8) -> String {
    let filled = usize::from(score.min(MAX_SCORE)) * BAR_WIDTH / usize::from(MAX_SCORE);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub fn score_colored(score: u8) -> ColoredString {
    let text = format!("{:>3}/{}", score, MAX_SCORE);
    match score {
        70..=u8::MAX => text.bright_green(),
        40..=69 => text.bright_yellow(),
        _ => text.bright_red(),
    }
}

/// Signed score change, `=` when unchanged
pub fn format_delta(delta: i16) -> String {
    if delta == 0 {
        "=".to_string()
    } else {
        format!("{:+}", delta)
    }
}

pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.0}s", secs)
    } else {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = (secs % 60.0) as u64;
        format!("{}m {}s", mins, remaining_secs)
    }
}

/// Cut `s` to `max` chars, marking the cut with `...`
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head)
}

pub fn print_cycle(cycle: &Cycle) {
    let feedback = &cycle.feedback;

    eprintln!();
    eprintln!(
        "{} {}",
        format!("=== Cycle {} ===", cycle.index).bright_blue().bold(),
        format!("({})", cycle.kind).dimmed()
    );
    eprintln!();
    for line in cycle.artifact.lines() {
        eprintln!("  {}", line.bold());
    }
    eprintln!();
    eprintln!(
        "{} {} {}",
        "Score:".dimmed(),
        score_bar(feedback.score()),
        score_colored(feedback.score())
    );
    eprintln!("{} {}", "Tier:".dimmed(), feedback.maturity_tier());

    print_list("Strengths", feedback.strengths(), "+");
    print_list("Weaknesses", feedback.weaknesses(), "-");
    print_list("Suggestions", feedback.suggestions(), ">");

    eprintln!("{} {}", "Verdict:".dimmed(), feedback.verdict());

    if feedback.is_degraded() {
        eprintln!(
            "{} {}",
            "⚠".bright_yellow(),
            "The evaluator reply could not be parsed, showing fallback feedback.".bright_yellow()
        );
    }

    eprintln!(
        "{} {} {}",
        "Models:".dimmed(),
        cycle.models_used,
        format!("({:.1}s)", cycle.duration.as_secs_f64()).dimmed()
    );
    eprintln!();
}

/// Word-level diff of two artifacts, whitespace collapsed
pub fn word_diff(previous: &str, revised: &str) -> Vec<DiffSpan> {
    let old: Vec<&str> = previous.split_whitespace().collect();
    let new: Vec<&str> = revised.split_whitespace().collect();

    if old.len().saturating_mul(new.len()) > MAX_DIFF_CELLS {
        let mut spans = Vec::new();
        if !old.is_empty() {
            spans.push(DiffSpan::Removed(old.join(" ")));
        }
        if !new.is_empty() {
            spans.push(DiffSpan::Added(new.join(" ")));
        }
        return spans;
    }

    // lcs[i][j]: longest common run of old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; new.len() + 1]; old.len() + 1];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut spans: Vec<DiffSpan> = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < old.len() || j < new.len() {
        let span = if i < old.len() && j < new.len() && old[i] == new[j] {
            i += 1;
            j += 1;
            DiffSpan::Kept(old[i - 1].to_string())
        } else if j < new.len() && (i == old.len() || lcs[i][j + 1] >= lcs[i + 1][j]) {
            j += 1;
            DiffSpan::Added(new[j - 1].to_string())
        } else {
            i += 1;
            DiffSpan::Removed(old[i - 1].to_string())
        };
        push_span(&mut spans, span);
    }
    spans
}

/// Append `span`, merging it into the last run of the same kind
fn push_span(spans: &mut Vec<DiffSpan>, span: DiffSpan) {
    match (spans.last_mut(), span) {
        (Some(DiffSpan::Kept(run)), DiffSpan::Kept(word))
        | (Some(DiffSpan::Removed(run)), DiffSpan::Removed(word))
        | (Some(DiffSpan::Added(run)), DiffSpan::Added(word)) => {
            run.push(' ');
            run.push_str(&word);
        }
        (_, span) => spans.push(span),
    }
}

/// Show what a revision changed
pub fn print_revision_diff(previous: &str, revised: &str) {
    let spans = word_diff(previous, revised);
    if spans.iter().all(|s| matches!(s, DiffSpan::Kept(_))) {
        eprintln!("{}", "Revision left the joke unchanged.".dimmed());
        eprintln!();
        return;
    }

    let rendered: Vec<String> = spans
        .iter()
        .map(|span| match span {
            DiffSpan::Kept(text) => text.normal().to_string(),
            DiffSpan::Removed(text) => text.bright_red().strikethrough().to_string(),
            DiffSpan::Added(text) => text.bright_green().underline().to_string(),
        })
        .collect();
    eprintln!("{}", "Changes:".dimmed());
    eprintln!("  {}", rendered.join(" "));
    eprintln!();
}

fn print_list(label: &str, items: &[String], bullet: &str) {
    if items.is_empty() {
        return;
    }
    eprintln!("{}", format!("{}:", label).dimmed());
    for item in items {
        eprintln!("  {} {}", bullet, item);
    }
}

pub fn print_config(config: &SessionConfig) {
    for role in [Role::Generator, Role::Evaluator] {
        let settings = config.role(role);
        let timeout = settings
            .timeout
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "none".to_string());
        eprintln!(
            "{:<10} {} (temperature {}, max_tokens {}, timeout {})",
            format!("{}:", role),
            settings.label(),
            settings.temperature,
            settings.max_tokens,
            timeout
        );
    }
}

/// Table of every cycle with the score change from the one before
pub fn print_summary(history: &History) {
    if history.is_empty() {
        eprintln!("{}", "No cycles recorded.".dimmed());
        return;
    }

    eprintln!();
    eprintln!("{}", "=== Session Summary ===".bright_blue().bold());
    eprintln!(
        "{:<6} {:<12} {:<8} {:<6} {}",
        "CYCLE".dimmed(),
        "KIND".dimmed(),
        "SCORE".dimmed(),
        "DELTA".dimmed(),
        "JOKE".dimmed()
    );

    let mut previous: Option<u8> = None;
    for cycle in history {
        let score = cycle.feedback.score();
        let delta = previous
            .map(|p| format_delta(i16::from(score) - i16::from(p)))
            .unwrap_or_default();
        let first_line = cycle.artifact.lines().next().unwrap_or_default();

        eprintln!(
            "{:<6} {:<12} {} {:<6} {}",
            cycle.index,
            cycle.kind.as_str(),
            score_colored(score),
            delta,
            truncate(first_line, 60)
        );
        previous = Some(score);
    }

    if let (Some(first), Some(last)) = (history.first(), history.last()) {
        let change = i16::from(last.feedback.score()) - i16::from(first.feedback.score());
        eprintln!();
        eprintln!(
            "{} {} -> {} ({})",
            "Overall:".dimmed(),
            first.feedback.score(),
            last.feedback.score(),
            format_delta(change)
        );
    }
}

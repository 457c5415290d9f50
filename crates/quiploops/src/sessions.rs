use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use colored::Colorize;

use quiploops_sessions::{Session, SessionFilter, SessionStats, SessionStore, SessionSummary};

use crate::render::{format_delta, format_duration, score_colored, truncate};

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List all sessions
    List {
        /// Only finished or only abandoned sessions
        #[arg(long, value_enum)]
        status: Option<StatusChoice>,

        /// Show sessions after this date (YYYY-MM-DD)
        #[arg(long)]
        after: Option<String>,

        /// Show sessions before this date (YYYY-MM-DD)
        #[arg(long)]
        before: Option<String>,

        /// Search topic text
        #[arg(long)]
        search: Option<String>,

        /// Filter by provider of either role
        #[arg(long)]
        provider: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show detailed session info
    Show {
        /// Session ID (launches interactive picker if omitted)
        id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show aggregate statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusChoice {
    Finished,
    Active,
}

pub async fn handle_sessions_command(action: SessionsAction) -> Result<()> {
    let store = SessionStore::new()?;

    match action {
        SessionsAction::List {
            status,
            after,
            before,
            search,
            provider,
            json,
        } => {
            let filter = build_filter(status, after, before, search, provider)?;
            let summaries = store.list(&filter)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("{}", "No sessions found.".dimmed());
            } else {
                print_sessions_table(&summaries);
            }
        }
        SessionsAction::Show { id, json } => {
            let id = resolve_session_id(&store, id)?;
            let session = store.get(&id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print_session_detail(&session);
            }
        }
        SessionsAction::Stats { json } => {
            let stats = store.stats(&SessionFilter::default())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
    }

    Ok(())
}

fn build_filter(
    status: Option<StatusChoice>,
    after: Option<String>,
    before: Option<String>,
    search: Option<String>,
    provider: Option<String>,
) -> Result<SessionFilter> {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    let parse_day = |s: &str, flag: &str, time: NaiveTime| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(|d| Utc.from_utc_datetime(&d.and_time(time)))
            .map_err(|e| anyhow::anyhow!("Invalid --{} date: {}", flag, e))
    };

    let after = after
        .map(|s| parse_day(&s, "after", NaiveTime::MIN))
        .transpose()?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    let before = before
        .map(|s| parse_day(&s, "before", end_of_day))
        .transpose()?;

    Ok(SessionFilter {
        after,
        before,
        search,
        provider,
        finished: status.map(|s| matches!(s, StatusChoice::Finished)),
    })
}

fn resolve_session_id(store: &SessionStore, id: Option<String>) -> Result<String> {
    if let Some(id) = id {
        return Ok(id);
    }

    // Interactive picker
    let summaries = store.list(&SessionFilter::default())?;
    if summaries.is_empty() {
        anyhow::bail!("No sessions found.");
    }

    let items: Vec<String> = summaries
        .iter()
        .map(|s| {
            let ts = s.timestamp.format("%Y-%m-%d %H:%M");
            let score = s
                .final_score
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{} | {:>3} ({} cycles) | \"{}\"",
                ts,
                score,
                s.cycles,
                truncate(&s.topic_preview, 60)
            )
        })
        .collect();

    let selection = dialoguer::FuzzySelect::new()
        .with_prompt("Select a session")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(summaries[selection].id.clone())
}

fn print_sessions_table(summaries: &[SessionSummary]) {
    println!(
        "{:<18} {:<9} {:<7} {:<6} {:<8} {:<28} {}",
        "TIMESTAMP".dimmed(),
        "STATUS".dimmed(),
        "CYCLES".dimmed(),
        "SCORE".dimmed(),
        "DURATION".dimmed(),
        "EVALUATOR".dimmed(),
        "TOPIC".dimmed(),
    );

    for s in summaries {
        let ts = s.timestamp.format("%Y-%m-%d %H:%M").to_string();
        let status = if s.finished {
            format!("{:<9}", "finished").bright_green().to_string()
        } else {
            format!("{:<9}", "active").bright_cyan().to_string()
        };
        let score = s
            .final_score
            .map(|v| format!("{:<6}", v))
            .unwrap_or_else(|| format!("{:<6}", "-"));
        let duration = s
            .duration_secs
            .map(format_duration)
            .unwrap_or_else(|| "...".to_string());

        println!(
            "{:<18} {} {:<7} {} {:<8} {:<28} {}",
            ts,
            status,
            s.cycles,
            score,
            duration,
            truncate(&s.evaluator, 28),
            truncate(&s.topic_preview, 50)
        );
    }
}

fn print_session_detail(session: &Session) {
    println!("{}", "=== Session Detail ===".bright_blue().bold());
    println!("{}  {}", "ID:".dimmed(), session.id);
    println!(
        "{}  {}",
        "Started:".dimmed(),
        session.start.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{}  {}/{}",
        "Generator:".dimmed(),
        session.start.generator_provider,
        session.start.generator_model
    );
    println!(
        "{}  {}/{}",
        "Evaluator:".dimmed(),
        session.start.evaluator_provider,
        session.start.evaluator_model
    );
    println!();
    println!("{}", "Topic:".dimmed());
    println!("  {}", session.start.topic);
    println!();

    if let Some(ref end) = session.end {
        println!("{}  {}", "Cycles:".dimmed(), end.cycles);
        if let Some(score) = end.final_score {
            println!("{}  {}", "Final score:".dimmed(), score_colored(score));
        }
        println!(
            "{}  {}",
            "Duration:".dimmed(),
            format_duration(end.duration_secs)
        );
    } else {
        println!("{}  {}", "Status:".dimmed(), "ACTIVE".bright_cyan());
    }

    if session.cycles.is_empty() {
        return;
    }

    let deltas = session.score_deltas();
    let best = session.best_cycle().map(|c| c.index);

    println!();
    println!(
        "{}",
        format!("--- Cycles ({}) ---", session.cycles.len()).dimmed()
    );
    for (i, cycle) in session.cycles.iter().enumerate() {
        let delta = if i == 0 {
            String::new()
        } else {
            deltas
                .get(i - 1)
                .map(|d| format!(" ({})", format_delta(*d)))
                .unwrap_or_default()
        };
        let marker = if best == Some(cycle.index) { " *" } else { "" };

        println!();
        println!(
            "  {} {} {}{}{}",
            format!("[{}]", cycle.index).bright_blue(),
            cycle.kind,
            score_colored(cycle.feedback.score()),
            delta,
            marker.bright_yellow()
        );
        println!(
            "    {} {}/{} -> {}/{}",
            "Models:".dimmed(),
            cycle.generator_provider,
            cycle.generator_model,
            cycle.evaluator_provider,
            cycle.evaluator_model
        );
        for line in cycle.artifact.lines() {
            println!("    {}", line);
        }
        println!(
            "    {} {}",
            "Verdict:".dimmed(),
            truncate(cycle.feedback.verdict(), 120)
        );
    }
}

fn print_stats(stats: &SessionStats) {
    println!("{}", "=== Session Statistics ===".bright_blue().bold());
    println!("{}  {}", "Total Sessions:".dimmed(), stats.total_sessions);
    println!("{}  {}", "Finished:".dimmed(), stats.finished_sessions);
    println!("{}  {:.1}", "Avg Cycles:".dimmed(), stats.avg_cycles);
    println!("{}  {:.1}", "Avg Final Score:".dimmed(), stats.avg_final_score);
    println!(
        "{}  {:+.1}",
        "Avg Improvement:".dimmed(),
        stats.avg_improvement
    );

    if !stats.by_provider.is_empty() {
        println!();
        println!("{}", "By Evaluator Provider:".dimmed());
        for p in &stats.by_provider {
            println!(
                "  {:<14} {} sessions, avg final score {:.1}",
                p.provider, p.total, p.avg_final_score
            );
        }
    }

    if !stats.sessions_over_time.is_empty() {
        println!();
        println!("{}", "By Day:".dimmed());
        for day in &stats.sessions_over_time {
            println!("  {}  {}", day.date, day.count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_dates() {
        let filter = build_filter(
            Some(StatusChoice::Active),
            Some("2026-01-20".into()),
            Some("2026-01-21".into()),
            None,
            Some("groq".into()),
        )
        .unwrap();

        assert_eq!(filter.finished, Some(false));
        assert_eq!(
            filter.after.unwrap().to_rfc3339(),
            "2026-01-20T00:00:00+00:00"
        );
        assert_eq!(
            filter.before.unwrap().to_rfc3339(),
            "2026-01-21T23:59:59+00:00"
        );
        assert_eq!(filter.provider.as_deref(), Some("groq"));
    }

    #[test]
    fn test_build_filter_rejects_bad_date() {
        let err = build_filter(None, Some("20/01/2026".into()), None, None, None).unwrap_err();
        assert!(err.to_string().contains("--after"));
    }
}

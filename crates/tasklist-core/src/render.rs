use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_deadline;
use crate::deadline::DeadlineStatus;
use crate::stats::{FilterCounts, Stats};
use crate::task::{Priority, Task};
use crate::view::{FilterMode, ViewRow};

const CHART_WIDTH: usize = 40;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    close_window: Duration,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color,
            close_window: cfg.close_window()?,
        })
    }

    pub fn plain(close_window: Duration) -> Self {
        Self {
            color: false,
            close_window,
        }
    }

    pub fn print_filter_bar(&self, counts: &FilterCounts, active: FilterMode) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.filter_bar(counts, active))?;
        Ok(())
    }

    pub fn filter_bar(&self, counts: &FilterCounts, active: FilterMode) -> String {
        [FilterMode::All, FilterMode::Active, FilterMode::Completed]
            .into_iter()
            .map(|mode| {
                let label = format!("{} ({})", capitalize(mode.as_str()), counts.get(mode));
                if mode == active {
                    self.paint(&format!("[{label}]"), "1")
                } else {
                    format!(" {label} ")
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[tracing::instrument(skip(self, rows, now))]
    pub fn print_task_table(&self, rows: &[ViewRow<'_>], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if rows.is_empty() {
            writeln!(out, "No matching tasks.")?;
            return Ok(());
        }
        self.write_task_table(&mut out, rows, now)
    }

    pub fn write_task_table<W: Write>(
        &self,
        writer: W,
        rows: &[ViewRow<'_>],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "#".to_string(),
            "ID".to_string(),
            "Done".to_string(),
            "Pri".to_string(),
            "Deadline".to_string(),
            "Text".to_string(),
        ];

        let body = rows
            .iter()
            .enumerate()
            .map(|(position, row)| {
                let task = row.task;
                vec![
                    self.paint(&(position + 1).to_string(), "33"),
                    task.id.to_string(),
                    if task.completed { "[x]" } else { "[ ]" }.to_string(),
                    self.paint_priority(task.priority),
                    self.deadline_cell(task, now),
                    if task.completed {
                        self.paint(&task.text, "9")
                    } else {
                        task.text.clone()
                    },
                ]
            })
            .collect();

        write_table(writer, headers, body)
    }

    #[tracing::instrument(skip(self, task, now), fields(id = task.id))]
    pub fn print_task_info(&self, task: &Task, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "text      {}", task.text)?;
        writeln!(out, "status    {}", if task.completed { "completed" } else { "active" })?;
        writeln!(out, "priority  {}", task.priority)?;
        writeln!(out, "created   {}", format_deadline(task.created_at))?;
        if let Some(deadline) = task.deadline {
            let status = DeadlineStatus::classify(Some(deadline), now, self.close_window)
                .map(|s| s.as_str())
                .unwrap_or_default();
            writeln!(out, "deadline  {} ({status})", format_deadline(deadline))?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, stats))]
    pub fn print_stats(&self, stats: &Stats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if stats.total == 0 {
            return Ok(());
        }

        writeln!(out, "Total:     {}", stats.total)?;
        writeln!(out, "Completed: {}", stats.completed)?;
        for priority in Priority::ALL {
            writeln!(
                out,
                "{:<10} {}",
                format!("{}:", capitalize(priority.as_str())),
                stats.by_priority(priority)
            )?;
        }
        writeln!(out, "Overdue:   {}", stats.overdue)?;
        writeln!(out)?;

        writeln!(out, "{}", self.chart_bar(stats))?;
        for (slice, code) in stats.chart().iter().zip(["32", "31"]) {
            writeln!(
                out,
                "{} {:<9} {:>3} ({:.0}%)",
                self.paint("#", code),
                slice.label,
                slice.value,
                slice.share_of(stats.total) * 100.0
            )?;
        }
        Ok(())
    }

    /// Completed/pending split as a fixed-width proportional bar.
    pub fn chart_bar(&self, stats: &Stats) -> String {
        let [completed, _] = stats.chart();
        let filled = (completed.share_of(stats.total) * CHART_WIDTH as f64).round() as usize;
        let filled = filled.min(CHART_WIDTH);
        format!(
            "[{}{}]",
            self.paint(&"#".repeat(filled), "32"),
            self.paint(&"-".repeat(CHART_WIDTH - filled), "31")
        )
    }

    fn deadline_cell(&self, task: &Task, now: DateTime<Utc>) -> String {
        let Some(deadline) = task.deadline else {
            return String::new();
        };
        let text = format_deadline(deadline);
        match DeadlineStatus::classify(Some(deadline), now, self.close_window) {
            Some(DeadlineStatus::Overdue) => self.paint(&format!("! {text}"), "31"),
            Some(DeadlineStatus::Close) => self.paint(&format!("~ {text}"), "33"),
            _ => text,
        }
    }

    fn paint_priority(&self, priority: Priority) -> String {
        let code = match priority {
            Priority::High => "31",
            Priority::Medium => "33",
            Priority::Low => "32",
        };
        self.paint(priority.as_str(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || text.is_empty() || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

//! Logs command implementation for viewing the interactive session log

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tokio::fs;

use crate::config::Config;

pub const LOG_FILE_NAME: &str = "deepseek-tui.log";

/// View and manage the log written by interactive sessions
#[derive(Debug, Args)]
pub struct LogsCommand {
    /// Number of lines to show from the end of the log
    #[arg(short, long, default_value = "100")]
    pub tail: usize,

    /// Filter logs by level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub level: Option<String>,

    #[command(subcommand)]
    pub command: Option<LogsSubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum LogsSubcommand {
    /// Clear the log file
    Clear,
}

/// Location of the log file for a configuration
pub fn log_file_path(config: &Config) -> PathBuf {
    config.logs_dir().join(LOG_FILE_NAME)
}

impl LogsCommand {
    /// Execute the logs command
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let log_file = log_file_path(config);

        if let Some(LogsSubcommand::Clear) = self.command {
            return Self::clear(&log_file).await;
        }

        if !log_file.exists() {
            eprintln!("No log file found at: {}", log_file.display());
            eprintln!("Logs are written while the interactive interface runs.");
            return Ok(());
        }

        let file = File::open(&log_file)
            .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;
        let lines = self.read_tail_lines(file)?;
        for line in self.filter_lines(lines) {
            print_formatted_line(&line);
        }
        Ok(())
    }

    async fn clear(log_file: &Path) -> Result<()> {
        if log_file.exists() {
            fs::write(log_file, "")
                .await
                .with_context(|| format!("Failed to clear log file: {}", log_file.display()))?;
            println!("Log file cleared: {}", log_file.display());
        } else {
            println!("No log file found to clear.");
        }
        Ok(())
    }

    /// Read the last N lines from a file
    fn read_tail_lines(&self, file: File) -> Result<Vec<String>> {
        let reader = BufReader::new(file);

        let all_lines: Vec<String> = reader
            .lines()
            .collect::<std::io::Result<Vec<_>>>()
            .context("Failed to read lines from log file")?;

        let skip_count = all_lines.len().saturating_sub(self.tail);
        Ok(all_lines.into_iter().skip(skip_count).collect())
    }

    fn filter_lines(&self, lines: Vec<String>) -> Vec<String> {
        match &self.level {
            Some(level) => lines
                .into_iter()
                .filter(|line| line_matches_level(line, level))
                .collect(),
            None => lines,
        }
    }
}

/// Find the level column of a `tracing_subscriber::fmt` line
fn line_level(line: &str) -> Option<&str> {
    line.split_whitespace()
        .take(3)
        .find(|word| matches!(*word, "TRACE" | "DEBUG" | "INFO" | "WARN" | "ERROR"))
}

fn line_matches_level(line: &str, level: &str) -> bool {
    line_level(line).map_or(false, |found| found.eq_ignore_ascii_case(level.trim()))
}

fn print_formatted_line(line: &str) {
    let colored = match line_level(line) {
        Some("ERROR") => format!("\x1b[31m{}\x1b[0m", line),
        Some("WARN") => format!("\x1b[33m{}\x1b[0m", line),
        Some("DEBUG") | Some("TRACE") => format!("\x1b[36m{}\x1b[0m", line),
        _ => line.to_string(),
    };
    println!("{}", colored);
}

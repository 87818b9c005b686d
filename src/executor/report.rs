use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::params::BindRow;

/// Timing and size of one `execute` call, produced for echo.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// Normalized SQL, still carrying `:name` placeholders.
    pub sql: String,
    pub rows: Vec<BindRow>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub elapsed: Duration,
    /// Rows returned, or rows affected for statements that return none.
    pub row_count: usize,
}

impl ExecutionReport {
    pub(crate) fn log(&self) {
        tracing::info!(
            sql = %self.sql,
            rows = ?self.rows,
            elapsed_ms = self.elapsed.as_secs_f64() * 1000.0,
            row_count = self.row_count,
            started_at = %self.started_at.format("%F %T%.3f"),
            finished_at = %self.finished_at.format("%F %T%.3f"),
            "executed statement"
        );
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.sql)?;
        if !self.rows.is_empty() {
            writeln!(f, "rows: {:?}", self.rows)?;
        }
        write!(
            f,
            "started {} | finished {} | elapsed {:.3}s | {} row(s)",
            self.started_at.format("%F %T%.3f"),
            self.finished_at.format("%F %T%.3f"),
            self.elapsed.as_secs_f64(),
            self.row_count
        )
    }
}

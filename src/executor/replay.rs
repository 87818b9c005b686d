use std::collections::VecDeque;

use crate::params::BindRow;
use crate::query_builder::BuiltStatement;

/// Per-row replay of one statement. Ends after the last row or the first failure.
#[derive(Debug)]
pub(crate) struct Replay {
    template: BuiltStatement,
    rows: VecDeque<BindRow>,
    finished: bool,
}

impl Replay {
    pub(crate) fn new(mut template: BuiltStatement) -> Self {
        let mut rows: VecDeque<BindRow> = std::mem::take(&mut template.rows).into();
        if rows.is_empty() {
            rows.push_back(BindRow::new());
        }
        Self {
            template,
            rows,
            finished: false,
        }
    }

    /// The statement for the next row, if any remain.
    pub(crate) fn next_statement(&mut self) -> Option<BuiltStatement> {
        if self.finished {
            return None;
        }
        let row = self.rows.pop_front()?;
        let mut statement = self.template.clone();
        statement.rows = vec![row];
        Some(statement)
    }

    pub(crate) fn finish(&mut self) {
        self.finished = true;
        self.rows.clear();
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> usize {
        self.rows.len()
    }
}

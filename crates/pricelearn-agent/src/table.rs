//! The policy store: per-state value estimates for every price action.
//!
//! Rows are created lazily with every action at `0.0`. Reads of a state that
//! was never inserted behave as if the row were all zeros, without inserting
//! it, so selection never mutates the table.

use crate::error::PersistError;
use pricelearn_core::{Action, State};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

pub type ActionValues = BTreeMap<Action, f64>;

fn zero_row() -> ActionValues {
    Action::ALL.into_iter().map(|a| (a, 0.0)).collect()
}

/// State → action → value estimate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    rows: HashMap<State, ActionValues>,
}

/// One persisted row of the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableRow {
    pub state: State,
    pub values: ActionValues,
}

/// On-disk layout of the model file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableFile {
    saved_at: String,
    states: Vec<TableRow>,
}

/// Summary of what the table has learned so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyReport {
    pub states_visited: usize,
    pub avg_q_value: f64,
    /// How many states prefer each action.
    pub best_action_distribution: BTreeMap<Action, usize>,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub state: State,
    pub best_action: Action,
    pub values: ActionValues,
}

impl QTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn contains(&self, state: &State) -> bool {
        self.rows.contains_key(state)
    }

    /// Inserts an all-zero row for `state` if there is none yet.
    pub fn ensure(&mut self, state: State) -> &mut ActionValues {
        self.rows.entry(state).or_insert_with(zero_row)
    }

    #[must_use]
    pub fn get(&self, state: &State, action: Action) -> f64 {
        self.rows
            .get(state)
            .and_then(|row| row.get(&action))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, state: State, action: Action, value: f64) {
        self.ensure(state).insert(action, value);
    }

    /// The highest-valued action; ties go to the earliest action in
    /// [`Action::ALL`]. A state without a row yields the first action.
    #[must_use]
    pub fn best_action(&self, state: &State) -> Action {
        let mut best = Action::ALL[0];
        let mut best_value = self.get(state, best);
        for action in Action::ALL.into_iter().skip(1) {
            let value = self.get(state, action);
            if value > best_value {
                best = action;
                best_value = value;
            }
        }
        best
    }

    /// `max_a Q(state, a)`; `0.0` for a state without a row.
    #[must_use]
    pub fn max_value(&self, state: &State) -> f64 {
        self.get(state, self.best_action(state))
    }

    /// Rows sorted by state, for stable output.
    #[must_use]
    pub fn rows(&self) -> Vec<TableRow> {
        let mut rows: Vec<TableRow> = self
            .rows
            .iter()
            .map(|(state, values)| TableRow {
                state: *state,
                values: values.clone(),
            })
            .collect();
        rows.sort_by_key(|r| r.state);
        rows
    }

    #[must_use]
    pub fn report(&self) -> PolicyReport {
        let mut best_action_distribution = BTreeMap::new();
        let mut total = 0.0;
        let mut count = 0usize;
        let rows: Vec<ReportRow> = self
            .rows()
            .into_iter()
            .map(|row| {
                let best_action = self.best_action(&row.state);
                *best_action_distribution.entry(best_action).or_insert(0) += 1;
                total += row.values.values().sum::<f64>();
                count += row.values.len();
                ReportRow {
                    state: row.state,
                    best_action,
                    values: row.values,
                }
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let avg_q_value = if count > 0 { total / count as f64 } else { 0.0 };

        PolicyReport {
            states_visited: rows.len(),
            avg_q_value,
            best_action_distribution,
            rows,
        }
    }

    /// Reads a table written by [`QTable::save`].
    ///
    /// Rows missing some actions are completed with `0.0`.
    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let bytes = fs::read(path).map_err(|e| PersistError::from_io(path, e))?;
        let file: TableFile =
            serde_json::from_slice(&bytes).map_err(|source| PersistError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        let mut table = QTable::new();
        for row in file.states {
            let entry = table.ensure(row.state);
            entry.extend(row.values);
        }
        Ok(table)
    }

    /// Writes the whole table to `path`, replacing any previous file.
    ///
    /// The data goes to a sibling temp file first and is renamed into place,
    /// so readers never see a half-written table.
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PersistError::from_io(parent, e))?;
            }
        }

        let file = TableFile {
            saved_at: iso8601_now(),
            states: self.rows(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|source| PersistError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        fs::write(&tmp, bytes).map_err(|e| PersistError::from_io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| PersistError::from_io(path, e))?;
        Ok(())
    }
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}

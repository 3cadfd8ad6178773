use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hwinfo::Environment;
use crate::sweep::SweepOutcome;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub environment: Environment,
    pub hardware: String,
    pub sweeps: Vec<SweepReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub id: String,
    pub file: String,
    pub title: String,
    pub columns: Vec<String>,
    /// One object per row, keyed by column name.
    pub rows: Vec<BTreeMap<String, Value>>,
}

impl RunReport {
    pub fn new(environment: Environment) -> Self {
        let hardware = environment.hardware_string();
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            environment,
            hardware,
            sweeps: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: &SweepOutcome) {
        self.sweeps.push(SweepReport::from_outcome(outcome));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let payload = serde_json::to_string_pretty(self).context("failed to encode report")?;
        fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid report {}", path.display()))
    }
}

impl SweepReport {
    pub fn from_outcome(outcome: &SweepOutcome) -> Self {
        let rows = outcome
            .rows
            .iter()
            .map(|row| {
                outcome
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| (column.clone(), cell_value(cell)))
                    .collect()
            })
            .collect();
        Self {
            id: outcome.id.as_str().to_string(),
            file: outcome.path.display().to_string(),
            title: outcome.title.clone(),
            columns: outcome.columns.clone(),
            rows,
        }
    }
}

/// Integers and decimals become JSON numbers; anything else stays a string.
fn cell_value(cell: &str) -> Value {
    if let Ok(int) = cell.parse::<u64>() {
        return Value::from(int);
    }
    match cell.parse::<f64>() {
        Ok(float) if float.is_finite() => Value::from(float),
        _ => Value::from(cell),
    }
}

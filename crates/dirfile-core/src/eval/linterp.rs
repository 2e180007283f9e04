//! LINTERP lookup tables.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::{BadTableSnafu, Result},
    storage::{self, DirfileLocation},
};

/// A sorted two-column lookup table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinterpTable {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl LinterpTable {
    /// Parse whitespace-separated `x y` rows. `#` starts a comment.
    pub(crate) fn parse(path: &Path, text: &str) -> Result<Self> {
        let bad = |reason: String| {
            BadTableSnafu {
                path: path.display().to_string(),
                reason,
            }
            .fail()
        };
        let mut rows = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default();
            let mut cols = line.split_whitespace();
            let (Some(x), Some(y)) = (cols.next(), cols.next()) else {
                if line.trim().is_empty() {
                    continue;
                }
                return bad(format!("line {} has fewer than two columns", lineno + 1));
            };
            match (x.parse::<f64>(), y.parse::<f64>()) {
                (Ok(x), Ok(y)) => rows.push((x, y)),
                _ => return bad(format!("line {} is not numeric", lineno + 1)),
            }
        }
        if rows.len() < 2 {
            return bad(format!("{} rows, at least two needed", rows.len()));
        }
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (x, y) = rows.into_iter().unzip();
        Ok(Self { x, y })
    }

    /// Interpolate linearly; values outside the table extrapolate from the
    /// two nearest rows.
    pub(crate) fn lookup(&self, v: f64) -> f64 {
        let n = self.x.len();
        let hi = self.x.partition_point(|&x| x < v).clamp(1, n - 1);
        let lo = hi - 1;
        let (x0, x1) = (self.x[lo], self.x[hi]);
        let (y0, y1) = (self.y[lo], self.y[hi]);
        if x1 == x0 {
            return y0;
        }
        y0 + (v - x0) * (y1 - y0) / (x1 - x0)
    }
}

/// Parsed tables keyed by path, loaded on first use.
#[derive(Debug, Default)]
pub(crate) struct TableCache {
    tables: HashMap<PathBuf, Arc<LinterpTable>>,
}

impl TableCache {
    pub(crate) fn load(&mut self, location: &DirfileLocation, path: &Path) -> Result<Arc<LinterpTable>> {
        if let Some(table) = self.tables.get(path) {
            return Ok(Arc::clone(table));
        }
        let text = storage::read_to_string(location, path)?;
        let table = Arc::new(LinterpTable::parse(path, &text)?);
        tracing::debug!(target: "dirfile", path = %path.display(), "loaded lookup table");
        self.tables.insert(path.to_path_buf(), Arc::clone(&table));
        Ok(table)
    }

    pub(crate) fn clear(&mut self) {
        self.tables.clear();
    }
}

//! Result records: one line per experiment (or per checkpoint interval) in
//! a scores file and a wins file.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::experiment::{Algorithm, ExperimentConfig, ExperimentResults};

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("results io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Scores and wins files that one run appends to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsFiles {
    pub scores: PathBuf,
    pub wins: PathBuf,
}

impl ResultsFiles {
    /// Files for `cfg` under `dir`, e.g. `TD_AS_1000_10_scores.csv`.
    ///
    /// The number after the game count is `floor(1000 * p)`, where `p` is
    /// epsilon for [`Algorithm::EpsilonGreedy`] and alpha otherwise.
    pub fn for_experiment(dir: &Path, cfg: &ExperimentConfig) -> Self {
        let param = match cfg.algorithm {
            Algorithm::EpsilonGreedy => cfg.epsilon,
            _ => cfg.learning.alpha,
        };
        let stem = format!("{}_{}_{}", cfg.algorithm.tag(), cfg.games, (1000.0 * param) as i64);
        Self { scores: dir.join(format!("{stem}_scores.csv")), wins: dir.join(format!("{stem}_wins.csv")) }
    }

    pub fn append(&self, results: &ExperimentResults) -> Result<(), ResultsError> {
        append_results(&self.scores, &self.wins, results)
    }
}

/// Append one line of scores and one line of wins (`1`/`0`).
pub fn append_results(scores_path: &Path, wins_path: &Path, results: &ExperimentResults) -> Result<(), ResultsError> {
    append_line(scores_path, results.scores.iter().map(u64::to_string))?;
    append_line(wins_path, results.wins.iter().map(|&w| if w { "1" } else { "0" }.to_string()))
}

fn append_line<I: Iterator<Item = String>>(path: &Path, values: I) -> Result<(), ResultsError> {
    let io_err = |source| ResultsError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    let line = values.collect::<Vec<_>>().join(",");
    writeln!(out, "{line}").map_err(io_err)?;
    out.flush().map_err(io_err)
}

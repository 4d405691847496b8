//! Line-oriented weight files.
//!
//! For each tuple in registration order: one `<patternIndex>, <weight>` line
//! per stored weight (ascending index), then the terminator `-1, -1`.

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;

use super::{NTupleError, NTupleNetwork, WeightTable};

const BLOCK_END: &str = "-1, -1";

impl NTupleNetwork {
    /// Write every weight table to `out`.
    pub fn write_weights<W: Write>(&self, mut out: W) -> Result<(), NTupleError> {
        for table in &self.weights {
            let mut entries: Vec<(u64, f64)> = table.iter().map(|(&k, &w)| (k, w)).collect();
            entries.sort_unstable_by_key(|&(k, _)| k);
            for (index, weight) in entries {
                writeln!(out, "{index}, {weight}")?;
            }
            writeln!(out, "{BLOCK_END}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Replace the weight tables with those read from `input`.
    ///
    /// On any error the network is reset to its untrained state.
    pub fn read_weights<R: BufRead>(&mut self, input: R) -> Result<(), NTupleError> {
        match parse_weights(input, self.tuples.len()) {
            Ok(tables) => {
                self.weights = tables;
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Save weights to `path`, overwriting it.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), NTupleError> {
        let file = fs::File::create(path.as_ref())?;
        self.write_weights(BufWriter::new(file))?;
        debug!("saved {} weights to {}", self.entries(), path.as_ref().display());
        Ok(())
    }

    /// Load weights from `path`.
    ///
    /// A missing or malformed file leaves the network untrained and returns
    /// the error; training can continue from scratch.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), NTupleError> {
        let file = match fs::File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) => {
                self.reset();
                return Err(e.into());
            }
        };
        self.read_weights(BufReader::new(file))?;
        debug!("loaded {} weights from {}", self.entries(), path.as_ref().display());
        Ok(())
    }
}

fn parse_weights<R: BufRead>(input: R, tuples: usize) -> Result<Vec<WeightTable>, NTupleError> {
    let mut tables: Vec<WeightTable> = (0..tuples).map(|_| WeightTable::default()).collect();
    let mut cursor = 0;
    let mut open_block = None;

    for (n, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = n + 1;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let (index, weight) = text
            .split_once(',')
            .ok_or_else(|| malformed(line_no, "expected `<index>, <weight>`"))?;
        let index: i64 = index.trim().parse().map_err(|_| malformed(line_no, "pattern index is not an integer"))?;
        let weight: f64 = weight.trim().parse().map_err(|_| malformed(line_no, "weight is not a number"))?;

        if index == -1 {
            cursor += 1;
            open_block = None;
            if cursor > tuples {
                return Err(malformed(line_no, format!("more weight blocks than the network's {tuples} tuples")));
            }
            continue;
        }
        if index < 0 {
            return Err(malformed(line_no, "negative pattern index"));
        }
        let table = tables
            .get_mut(cursor)
            .ok_or_else(|| malformed(line_no, format!("more weight blocks than the network's {tuples} tuples")))?;
        table.insert(index as u64, weight);
        open_block = Some(line_no);
    }

    if let Some(line_no) = open_block {
        return Err(malformed(line_no, "last block is missing its `-1, -1` terminator"));
    }
    Ok(tables)
}

fn malformed(line: usize, reason: impl Into<String>) -> NTupleError {
    NTupleError::Malformed { line, reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::State;
    use crate::ntuple::NTupleConfig;
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::NamedTempFile;
    use test_log::test;

    fn trained() -> (NTupleNetwork, Vec<State>) {
        let mut rng = StdRng::seed_from_u64(21);
        let mut v = NTupleNetwork::standard(0.05);
        let mut states = Vec::new();
        let mut s = State::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        for i in 0..60 {
            v.train(s, (i % 7) as f64 * 3.25 - 4.0);
            states.push(s);
            s = s.with_random_tile(&mut rng);
            if s.count_empty() == 0 {
                s = State::EMPTY.with_random_tile(&mut rng);
            }
        }
        (v, states)
    }

    #[test]
    fn save_then_load_reproduces_evaluations() {
        let (v, states) = trained();
        let tmp = NamedTempFile::new().unwrap();
        v.save(tmp.path()).unwrap();

        let mut loaded = NTupleNetwork::standard(0.05);
        loaded.load(tmp.path()).unwrap();
        assert_eq!(loaded.entries(), v.entries());
        for s in states {
            assert_eq!(loaded.evaluate(s), v.evaluate(s));
        }
    }

    #[test]
    fn writes_one_terminated_block_per_tuple() {
        let mut v = NTupleNetwork::new(NTupleConfig { capacity: 2, alpha: 0.5, ..NTupleConfig::default() });
        v.add_tuple(&[0, 1, 2, 3]).unwrap();
        v.add_tuple(&[0, 4, 8, 12]).unwrap();
        let s = State::from_tiles([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        v.train(s, 2.0);

        let mut buf = Vec::new();
        v.write_weights(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "201, 1\n-1, -1\n1, 1\n-1, -1\n");
    }

    #[test]
    fn missing_file_leaves_network_untrained() {
        let (mut v, states) = trained();
        let dir = tempfile::tempdir().unwrap();
        let err = v.load(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, NTupleError::Io(_)));
        assert_eq!(v.entries(), 0);
        assert_eq!(v.evaluate(states[0]), 0.0);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        let mut v = NTupleNetwork::standard(0.01);
        let err = v.read_weights("12, 0.5\nnot a weight\n".as_bytes()).unwrap_err();
        assert!(matches!(err, NTupleError::Malformed { line: 2, .. }));
        assert_eq!(v.entries(), 0);

        let err = v.read_weights("12, 0.5\n".as_bytes()).unwrap_err();
        assert!(matches!(err, NTupleError::Malformed { line: 1, .. }));

        let err = v.read_weights("-7, 1.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, NTupleError::Malformed { .. }));
    }

    #[test]
    fn too_many_blocks_are_rejected() {
        let mut v = NTupleNetwork::new(NTupleConfig { capacity: 1, ..NTupleConfig::default() });
        v.add_tuple(&[0, 1, 2, 3]).unwrap();
        assert!(v.read_weights("1, 2\n-1, -1\n3, 4\n-1, -1\n".as_bytes()).is_err());
        assert_eq!(v.entries(), 0);
    }

    #[test]
    fn fewer_blocks_and_blank_lines_are_accepted() {
        let mut v = NTupleNetwork::standard(0.01);
        v.read_weights("\n5, 1.5\n-1, -1\n\n".as_bytes()).unwrap();
        assert_eq!(v.entries(), 1);
        let s = State::from_tiles([[8, 4, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        // row tuple index 3 + 200 = 203, not 5
        assert_eq!(v.evaluate(s), 0.0);
        let s = State::from_tiles([[32, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        assert_eq!(v.evaluate(s), 1.5);
    }
}

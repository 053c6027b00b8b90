//! On-disk dedup index of downloaded submissions
//!
//! The index is a UTF-8 text file, `index.idx` at the output root, with one
//! parenthesized submission id per line, append-only. Membership is served
//! from an in-memory set loaded once; a single appender writes new entries.
//! An id in the index is authoritative even if the file on disk was later
//! removed.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

const INDEX_FILE: &str = "index.idx";

/// Filename pattern embedding an id, shared by the write path and the
/// rebuild walk so a rebuilt index is interchangeable with a written one.
const ID_PATTERN: &str = r"\((\d{5,})\)";

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Persistent set of already-downloaded submission ids.
pub struct DownloadIndex {
    path: PathBuf,
    ids: BTreeSet<u64>,
    appender: Option<File>,
}

impl DownloadIndex {
    /// Loads the index under `output_root`, starting empty when none exists.
    pub fn load(output_root: &Path) -> Result<Self, IndexError> {
        let path = output_root.join(INDEX_FILE);
        let mut ids: BTreeSet<u64> = BTreeSet::new();

        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line.map_err(|source| io_error(&path, source))?;
                    match parse_entry(&line) {
                        Some(id) => {
                            ids.insert(id);
                        }
                        None if line.trim().is_empty() => {}
                        None => tracing::warn!("Ignoring malformed index line: {}", line),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(io_error(&path, source)),
        }

        Ok(DownloadIndex {
            path,
            ids,
            appender: None,
        })
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Appends an id to the persisted set. Already-known ids are not
    /// re-written.
    pub fn record(&mut self, id: u64) -> Result<(), IndexError> {
        if !self.ids.insert(id) {
            return Ok(());
        }

        if self.appender.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|source| io_error(&self.path, source))?;
            self.appender = Some(file);
        }

        if let Some(file) = self.appender.as_mut() {
            writeln!(file, "({})", id).map_err(|source| io_error(&self.path, source))?;
            file.flush().map_err(|source| io_error(&self.path, source))?;
        }
        Ok(())
    }

    /// Rebuilds the index from an existing output tree, for recovering an
    /// index that was lost or never written.
    ///
    /// The walk is iterative with an explicit directory stack and collects
    /// every filename embedding a parenthesized id. Returns the number of
    /// ids indexed.
    pub fn rebuild(output_root: &Path) -> Result<usize, IndexError> {
        let id_pattern = Regex::new(ID_PATTERN).expect("static pattern");
        let mut ids: BTreeSet<u64> = BTreeSet::new();
        let mut stack = vec![output_root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let entries = std::fs::read_dir(&dir).map_err(|source| io_error(&dir, source))?;
            for entry in entries {
                let entry = entry.map_err(|source| io_error(&dir, source))?;
                let path = entry.path();

                if path.is_dir() {
                    stack.push(path);
                    continue;
                }

                let ext = path.extension().and_then(|ext| ext.to_str());
                if matches!(ext, Some("txt") | Some("idx") | Some("json")) {
                    continue;
                }

                let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                if let Some(capture) = id_pattern.captures(name) {
                    if let Ok(id) = capture[1].parse() {
                        tracing::debug!("found: {}", path.display());
                        ids.insert(id);
                    }
                }
            }
        }

        let index_path = output_root.join(INDEX_FILE);
        let mut file = File::create(&index_path).map_err(|source| io_error(&index_path, source))?;
        for id in &ids {
            writeln!(file, "({})", id).map_err(|source| io_error(&index_path, source))?;
        }

        Ok(ids.len())
    }
}

fn parse_entry(line: &str) -> Option<u64> {
    line.trim().strip_prefix('(')?.strip_suffix(')')?.parse().ok()
}

fn io_error(path: &Path, source: std::io::Error) -> IndexError {
    IndexError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_contains() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = DownloadIndex::load(dir.path()).unwrap();

        assert!(index.is_empty());
        index.record(47526990).unwrap();
        index.record(47526991).unwrap();
        index.record(47526990).unwrap();

        assert!(index.contains(47526990));
        assert!(!index.contains(40000000));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_persisted_entries_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut index = DownloadIndex::load(dir.path()).unwrap();
            index.record(47526990).unwrap();
        }

        let index = DownloadIndex::load(dir.path()).unwrap();
        assert!(index.contains(47526990));

        let contents = std::fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        assert_eq!(contents, "(47526990)\n");
    }

    #[test]
    fn test_malformed_lines_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(INDEX_FILE),
            "(47526990)\nnot-an-entry\n\n(47526991)\n",
        )
        .unwrap();

        let index = DownloadIndex::load(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_rebuild_walks_the_output_tree() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("koul").join("scraps").join("General");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            nested.join("Morning Patrol (47526990) - patrol.png"),
            b"data",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("koul").join("Sketch (47526991) - sketch.jpg"),
            b"data",
        )
        .unwrap();
        // no embedded id, and a sidecar that must both be skipped
        std::fs::write(dir.path().join("koul").join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("koul").join("stray.png"), b"x").unwrap();

        let count = DownloadIndex::rebuild(dir.path()).unwrap();
        assert_eq!(count, 2);

        // a rebuilt index reads back exactly like an incrementally written one
        let index = DownloadIndex::load(dir.path()).unwrap();
        assert!(index.contains(47526990));
        assert!(index.contains(47526991));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_rebuild_ignores_short_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Sketch (1234) - x.png"), b"x").unwrap();

        let count = DownloadIndex::rebuild(dir.path()).unwrap();
        assert_eq!(count, 0);
    }
}

//! Per-channel notes.
//!
//! A plain text file of `gpio:text` records, one per line (`10:Vocal mic`).
//! The UI owns it; the supervisor never reads it.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use relaybank_protocol::{PinId, PinSet};

use crate::error::NotesError;

/// Notes keyed by relay channel.
#[derive(Debug, Clone)]
pub struct NotesStore {
    path: PathBuf,
    notes: BTreeMap<PinId, String>,
}

impl NotesStore {
    /// Read the notes file, creating it empty if it does not exist.
    ///
    /// Lines that are not `gpio:text` records are skipped with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, NotesError> {
        let path = path.into();

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "creating empty notes file");
                fs::write(&path, "").map_err(|source| NotesError::Io { path: path.clone(), source })?;
                String::new()
            }
            Err(source) => return Err(NotesError::Io { path, source }),
        };

        let mut notes = BTreeMap::new();
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_record(line) {
                Some((pin, text)) => {
                    notes.insert(pin, text.to_string());
                }
                None => {
                    tracing::warn!(path = %path.display(), line = number + 1, "skipping malformed note");
                }
            }
        }

        tracing::debug!(path = %path.display(), count = notes.len(), "loaded notes");
        Ok(NotesStore { path, notes })
    }

    /// The file this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The note for a channel.
    pub fn get(&self, pin: PinId) -> Option<&str> {
        self.notes.get(&pin).map(String::as_str)
    }

    /// Replace the note for a channel. Line breaks become spaces.
    pub fn set(&mut self, pin: PinId, text: &str) {
        let text = text.replace(['\r', '\n'], " ");
        self.notes.insert(pin, text.trim().to_string());
    }

    /// Write one record per channel in `pins`, in pin order.
    pub fn save(&self, pins: &PinSet) -> Result<(), NotesError> {
        let mut contents = String::new();
        for pin in pins.iter() {
            contents.push_str(&format!("{}:{}\n", pin.gpio(), self.get(pin).unwrap_or("")));
        }

        fs::write(&self.path, contents).map_err(|source| NotesError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), "saved notes");
        Ok(())
    }
}

fn parse_record(line: &str) -> Option<(PinId, &str)> {
    let (key, text) = line.split_once(':')?;
    let pin = key.trim().parse::<u8>().ok().and_then(PinId::new)?;
    Some((pin, text.trim()))
}

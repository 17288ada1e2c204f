//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Inboxd.
//
// Inboxd is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Inboxd is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Inboxd. If not, see <http://www.gnu.org/licenses/>.

//! The in-memory snapshot of an account's inbox.
//!
//! A snapshot is a list of message files sorted by name. A message's
//! sequence number (which also serves as its UID) is its position in the
//! list plus one, so removing an entry implicitly renumbers everything after
//! it. Flags live only in memory, except that `\Deleted` causes the
//! underlying file to be removed.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::PathBuf;

use log::{error, info, warn};

use super::model::*;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

#[derive(Clone, Debug)]
struct MessageEntry {
    filename: String,
    flags: BTreeSet<Flag>,
}

/// The result of a `STORE` against one sequence number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreResponse {
    /// The flags of the message after the operation, in sorted order.
    ///
    /// If the message was removed, this is the flag set it had at the moment
    /// of removal.
    pub flags: Vec<Flag>,
    /// Whether the operation caused a message to be removed.
    pub removed: bool,
}

#[derive(Clone)]
pub struct Mailbox {
    log_prefix: LogPrefix,
    root: PathBuf,
    entries: Vec<MessageEntry>,
    /// Flags stored against sequence numbers beyond the end of `entries`.
    stray_flags: BTreeMap<Seqnum, BTreeSet<Flag>>,
}

impl Mailbox {
    /// List the message files in `root`.
    ///
    /// A missing directory is an empty mailbox. Files whose name is not
    /// valid UTF-8 are skipped.
    pub fn load(
        log_prefix: LogPrefix,
        root: PathBuf,
        message_extension: &str,
    ) -> Result<Self, Error> {
        let mut names = Vec::new();

        let dir = match fs::read_dir(&root) {
            Ok(dir) => Some(dir),
            Err(e) if io::ErrorKind::NotFound == e.kind() => None,
            Err(e) => return Err(e.into()),
        };

        for entry in dir.into_iter().flatten() {
            let entry = entry?;
            let path = entry.path();
            let is_message = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case(message_extension));
            if !is_message || !path.is_file() {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!(
                    "{} Ignoring non-UTF-8 file name {:?}",
                    log_prefix, name
                ),
            }
        }

        names.sort();

        Ok(Mailbox {
            log_prefix,
            root,
            entries: names
                .into_iter()
                .map(|filename| MessageEntry {
                    filename,
                    flags: BTreeSet::new(),
                })
                .collect(),
            stray_flags: BTreeMap::new(),
        })
    }

    /// The number of messages currently in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the sequence numbers of every message in the snapshot.
    pub fn seqnums(&self) -> impl Iterator<Item = Seqnum> {
        (0..self.entries.len()).map(Seqnum::from_index)
    }

    /// Return the path of the file backing `seqnum`.
    pub fn path(&self, seqnum: Seqnum) -> Result<PathBuf, Error> {
        self.entries
            .get(seqnum.to_index())
            .map(|entry| self.root.join(&entry.filename))
            .ok_or(Error::NxMessage)
    }

    /// Read the raw content of `seqnum`.
    pub fn read(&self, seqnum: Seqnum) -> Result<Vec<u8>, Error> {
        Ok(fs::read(self.path(seqnum)?)?)
    }

    /// Return the current flags of `seqnum`, in sorted order.
    pub fn flags(&self, seqnum: Seqnum) -> Vec<Flag> {
        match self.entries.get(seqnum.to_index()) {
            Some(entry) => entry.flags.iter().cloned().collect(),
            None => self
                .stray_flags
                .get(&seqnum)
                .map(|flags| flags.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// Apply a `STORE` operation to `seqnum`.
    ///
    /// `seqnum` need not refer to an existing message; flags can be stored
    /// against any sequence number.
    ///
    /// If the resulting flag set contains `\Deleted`, the file is removed,
    /// the entry is taken out of the snapshot, and the flags of every message
    /// are reset to the empty set. Failure to remove the file is logged but
    /// does not fail the operation.
    pub fn store(
        &mut self,
        seqnum: Seqnum,
        op: StoreOp,
        flags: &[Flag],
    ) -> StoreResponse {
        let index = seqnum.to_index();
        let current = match self.entries.get_mut(index) {
            Some(entry) => &mut entry.flags,
            None => self.stray_flags.entry(seqnum).or_default(),
        };

        match op {
            StoreOp::Add => current.extend(flags.iter().cloned()),
            StoreOp::Remove => {
                for flag in flags {
                    current.remove(flag);
                }
            }
            StoreOp::Keep => (),
        }

        let result: Vec<Flag> = current.iter().cloned().collect();
        if !current.contains(&Flag::Deleted) {
            return StoreResponse {
                flags: result,
                removed: false,
            };
        }

        if index < self.entries.len() {
            let entry = self.entries.remove(index);
            self.remove_file(&entry.filename);
        } else {
            warn!(
                "{} \\Deleted stored on nonexistent message {}",
                self.log_prefix, seqnum
            );
        }

        self.reset_flags();
        StoreResponse {
            flags: result,
            removed: true,
        }
    }

    /// Remove every message flagged `\Deleted`.
    ///
    /// A message is taken out of the snapshot only if its file was removed
    /// (or was already gone). Returns the sequence numbers the removed
    /// messages had before the operation, in descending order.
    pub fn expunge(&mut self) -> Vec<Seqnum> {
        let doomed: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|&(_, entry)| entry.flags.contains(&Flag::Deleted))
            .map(|(ix, _)| ix)
            .collect();

        let mut expunged = Vec::new();
        for ix in doomed.into_iter().rev() {
            if self.remove_file(&self.entries[ix].filename) {
                self.entries.remove(ix);
                expunged.push(Seqnum::from_index(ix));
            }
        }

        expunged
    }

    fn reset_flags(&mut self) {
        for entry in &mut self.entries {
            entry.flags.clear();
        }
        self.stray_flags.clear();
    }

    fn remove_file(&self, filename: &str) -> bool {
        let path = self.root.join(filename);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("{} Deleted {}", self.log_prefix, path.display());
                true
            }
            Err(e) if io::ErrorKind::NotFound == e.kind() => {
                warn!(
                    "{} {} was already deleted",
                    self.log_prefix,
                    path.display()
                );
                true
            }
            Err(e) => {
                error!(
                    "{} Failed to delete {}: {}",
                    self.log_prefix,
                    path.display(),
                    e
                );
                false
            }
        }
    }
}

/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::sync::Mutex;

use chrono::{DateTime, Local};

use crate::common::DirSpec;

////////////////////////////////////////////////////////////////////////////////
// struct SyncPair

///One declared synchronization pair.
///
///The identity of a pair is its *source* specifier alone: two pairs with
///the same source are the same entry regardless of target, so a source
///directory can never be synchronized to two targets at once.
#[derive(Clone, Debug)]
pub struct SyncPair {
    pub source: DirSpec,
    pub target: DirSpec,
    ///Cleared by `cancel`. Deactivation is sticky: the entry stays in the
    ///registry until manager shutdown, it is merely marked inactive.
    pub active: bool,
    ///When the most recent successful file transfer for this pair finished.
    pub last_sync_time: Option<DateTime<Local>>,
    ///How many file transfers for this pair have failed.
    pub error_count: u32,
}

impl SyncPair {
    pub fn new(source: DirSpec, target: DirSpec) -> SyncPair {
        SyncPair {
            source,
            target,
            active: true,
            last_sync_time: None,
            error_count: 0,
        }
    }
}

///The result of [`SyncRegistry::add()`](struct.SyncRegistry.html).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    ///An entry with the same source already exists (active or not).
    AlreadyExists,
}

////////////////////////////////////////////////////////////////////////////////
// struct SyncRegistry

///The thread-safe store of declared sync pairs.
///
///All operations take the internal mutex and are linear in the number of
///entries, which is expected to stay in the tens. Reads hand out clones
///rather than references, so no caller can observe an entry while another
///thread mutates it.
pub struct SyncRegistry {
    entries: Mutex<Vec<SyncPair>>,
}

impl SyncRegistry {
    pub fn new() -> SyncRegistry {
        SyncRegistry {
            entries: Mutex::new(Vec::new()),
        }
    }

    ///Inserts a new pair unless an entry with the same source exists.
    pub fn add(&self, source: DirSpec, target: DirSpec) -> AddOutcome {
        let mut entries = self.entries.lock().unwrap();
        if entries.iter().any(|pair| pair.source == source) {
            return AddOutcome::AlreadyExists;
        }
        entries.push(SyncPair::new(source, target));
        AddOutcome::Added
    }

    ///Returns a copy of the entry with the given source, if any.
    pub fn find(&self, source: &DirSpec) -> Option<SyncPair> {
        let entries = self.entries.lock().unwrap();
        entries.iter().find(|pair| &pair.source == source).cloned()
    }

    ///Marks the entry with the given source as inactive. Returns false if
    ///there is no such entry. In-flight and already-queued jobs for the
    ///pair are not affected; deactivation only concerns future syncs.
    pub fn deactivate(&self, source: &DirSpec) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|pair| &pair.source == source) {
            Some(pair) => {
                pair.active = false;
                true
            }
            None => false,
        }
    }

    ///Removes the entry with the given source. Returns false if there is no
    ///such entry. (The console never removes entries; this exists for
    ///symmetry with `add`.)
    pub fn remove(&self, source: &DirSpec) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|pair| &pair.source != source);
        entries.len() != before
    }

    ///Records the outcome of one file transfer: a success stamps
    ///`last_sync_time`, a failure bumps `error_count`. Jobs do not carry a
    ///reference to their pair, so workers report by source specifier; a
    ///report for an unknown source (entry removed meanwhile) is dropped.
    pub fn record_outcome(&self, source: &DirSpec, success: bool) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(pair) = entries.iter_mut().find(|pair| &pair.source == source) {
            if success {
                pair.last_sync_time = Some(Local::now());
            } else {
                pair.error_count += 1;
            }
        }
    }

    ///Returns a copy of all entries, for display.
    pub fn snapshot(&self) -> Vec<SyncPair> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SyncRegistry {
    fn default() -> SyncRegistry {
        SyncRegistry::new()
    }
}

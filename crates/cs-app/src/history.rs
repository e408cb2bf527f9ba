//! In-memory ordered entry collection shared by the upload pipeline and the
//! reconciliation engine.
//!
//! Sorted by `created_at` descending; ties go to the most recent application.
//! Ids are unique.

use std::sync::Arc;

use tokio::sync::Mutex;

use cs_core::{ClipboardEntry, EntryId, ItemFilter, UploadState};

pub type SharedHistory = Arc<Mutex<EntryCollection>>;

pub fn shared_history() -> SharedHistory {
    Arc::new(Mutex::new(EntryCollection::default()))
}

#[derive(Debug, Clone)]
struct Slot {
    entry: ClipboardEntry,
    seq: u64,
}

impl Slot {
    fn sort_key(&self) -> (i64, u64) {
        (self.entry.created_at_ms(), self.seq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Merged,
}

#[derive(Debug, Default)]
pub struct EntryCollection {
    slots: Vec<Slot>,
    next_seq: u64,
}

impl EntryCollection {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &EntryId) -> Option<&ClipboardEntry> {
        self.position(id).map(|idx| &self.slots[idx].entry)
    }

    pub fn snapshot(&self) -> Vec<ClipboardEntry> {
        self.slots.iter().map(|slot| slot.entry.clone()).collect()
    }

    /// Entries shown under `filter`. Server pages are already filtered;
    /// unconfirmed entries are matched locally.
    pub fn visible(&self, filter: &ItemFilter) -> Vec<ClipboardEntry> {
        self.slots
            .iter()
            .map(|slot| &slot.entry)
            .filter(|entry| entry.upload_state.is_confirmed() || filter.matches_local(entry))
            .cloned()
            .collect()
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.slots.iter().map(|slot| slot.entry.id.clone()).collect()
    }

    /// Insert unless an entry with the same id exists. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, entry: ClipboardEntry) -> bool {
        if self.contains(&entry.id) {
            return false;
        }
        let seq = self.bump_seq();
        self.place(Slot { entry, seq });
        true
    }

    /// Insert a server-confirmed entry, or merge it onto the existing one.
    pub fn merge_remote(&mut self, remote: ClipboardEntry) -> MergeOutcome {
        let seq = self.bump_seq();
        match self.position(&remote.id) {
            Some(idx) => {
                let mut slot = self.slots.remove(idx);
                slot.entry.merge_remote(remote);
                slot.seq = seq;
                self.place(slot);
                MergeOutcome::Merged
            }
            None => {
                self.place(Slot { entry: remote, seq });
                MergeOutcome::Inserted
            }
        }
    }

    /// Mutate an entry in place; its position is recomputed afterwards.
    pub fn update<F>(&mut self, id: &EntryId, f: F) -> bool
    where
        F: FnOnce(&mut ClipboardEntry),
    {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let mut slot = self.slots.remove(idx);
        f(&mut slot.entry);
        slot.entry.id = id.clone();
        self.place(slot);
        true
    }

    pub fn set_upload_state(&mut self, id: &EntryId, state: UploadState) -> bool {
        self.update(id, |entry| entry.upload_state = state)
    }

    pub fn remove(&mut self, id: &EntryId) -> Option<ClipboardEntry> {
        self.position(id).map(|idx| self.slots.remove(idx).entry)
    }

    /// Replace a local id with the server-assigned one.
    ///
    /// If the server id is already present (a push beat the upload response)
    /// the local entry folds into it instead of producing a second row.
    pub fn migrate_id(&mut self, old: &EntryId, new: &EntryId) -> bool {
        if old == new {
            return self.contains(old);
        }
        let Some(old_idx) = self.position(old) else {
            return false;
        };
        let local = self.slots.remove(old_idx);

        match self.position(new) {
            Some(idx) => {
                let target = &mut self.slots[idx].entry;
                if target.is_image() && local.entry.image_ref.is_some() {
                    let keeps_original = matches!(
                        local.entry.image_fidelity,
                        cs_core::ImageFidelity::Original
                    );
                    if keeps_original {
                        target.image_ref = local.entry.image_ref;
                        target.image_fidelity = local.entry.image_fidelity;
                    }
                }
                target.upload_state = UploadState::Succeeded;
            }
            None => {
                let mut slot = local;
                slot.entry.id = new.clone();
                self.place(slot);
            }
        }
        true
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&ClipboardEntry) -> bool,
    {
        self.slots.retain(|slot| keep(&slot.entry));
    }

    /// Verify ordering and id uniqueness. Returns a description of the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for window in self.slots.windows(2) {
            if window[0].sort_key() < window[1].sort_key() {
                return Err(format!(
                    "entry {} is ordered before newer entry {}",
                    window[0].entry.id, window[1].entry.id
                ));
            }
        }
        for slot in &self.slots {
            if !seen.insert(slot.entry.id.clone()) {
                return Err(format!("duplicate id {}", slot.entry.id));
            }
        }
        Ok(())
    }

    fn position(&self, id: &EntryId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.entry.id == *id)
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn place(&mut self, slot: Slot) {
        let key = slot.sort_key();
        let idx = self.slots.partition_point(|existing| existing.sort_key() > key);
        self.slots.insert(idx, slot);
    }
}

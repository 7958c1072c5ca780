use std::collections::btree_map::{self, BTreeMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use failure::Fail;

use crate::notes::{NoteKey, NoteRecord};

type NoteMap = BTreeMap<NoteKey, NoteRecord>;

#[derive(Debug, Fail)]
pub enum TableError {
  #[fail(display = "No live note for channel {} pitch {}", channel, pitch)]
  MissingKey { channel: u8, pitch: u8 },
}

impl TableError {
  fn missing(key: NoteKey) -> TableError {
    TableError::MissingKey {
      channel: key.channel,
      pitch: key.pitch,
    }
  }
}

/// Outcome of a whole table transition.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Sweep {
  pub kept: usize,
  pub evicted: Vec<NoteKey>,
}

/// Point in time view of the table. Iterates in `(channel, pitch)` order.
#[derive(Debug, Clone)]
pub struct Snapshot {
  notes: Arc<NoteMap>,
}

impl Snapshot {
  pub fn len(&self) -> usize {
    self.notes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.notes.is_empty()
  }

  pub fn get(&self, key: &NoteKey) -> Option<&NoteRecord> {
    self.notes.get(key)
  }

  pub fn contains_key(&self, key: &NoteKey) -> bool {
    self.notes.contains_key(key)
  }

  pub fn iter(&self) -> btree_map::Values<'_, NoteKey, NoteRecord> {
    self.notes.values()
  }
}

impl<'a> IntoIterator for &'a Snapshot {
  type Item = &'a NoteRecord;
  type IntoIter = btree_map::Values<'a, NoteKey, NoteRecord>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

/// Concurrent note store.
///
/// The map itself is immutable and every write publishes a new one with a
/// compare-and-swap loop, so readers never lock and never see a partial write.
/// A writer that loses the race recomputes its transition from the winner's map.
pub struct NoteTable {
  notes: ArcSwap<NoteMap>,
}

impl NoteTable {
  pub fn new() -> NoteTable {
    NoteTable {
      notes: ArcSwap::from_pointee(NoteMap::new()),
    }
  }

  pub fn len(&self) -> usize {
    self.notes.load().len()
  }

  pub fn is_empty(&self) -> bool {
    self.notes.load().is_empty()
  }

  pub fn get(&self, key: &NoteKey) -> Option<NoteRecord> {
    self.notes.load().get(key).copied()
  }

  pub fn put(&self, record: NoteRecord) {
    let key = record.key();
    self.notes.rcu(|current| {
      let mut next = NoteMap::clone(current);
      next.insert(key, record);
      next
    });
  }

  /// Replaces the record for `key` with `f(record)` and returns the new record.
  pub fn update<F>(&self, key: NoteKey, mut f: F) -> Result<NoteRecord, TableError>
  where
    F: FnMut(&NoteRecord) -> NoteRecord,
  {
    let mut outcome = Err(TableError::missing(key));
    self.notes.rcu(|current| match current.get(&key) {
      Some(record) => {
        let updated = f(record);
        outcome = Ok(updated);
        if updated == *record {
          Arc::clone(current)
        } else {
          let mut next = NoteMap::clone(current);
          next.insert(key, updated);
          Arc::new(next)
        }
      }
      None => {
        outcome = Err(TableError::missing(key));
        Arc::clone(current)
      }
    });
    outcome
  }

  pub fn remove(&self, key: &NoteKey) -> Option<NoteRecord> {
    let mut removed = None;
    self.notes.rcu(|current| {
      removed = current.get(key).copied();
      if removed.is_some() {
        let mut next = NoteMap::clone(current);
        next.remove(key);
        Arc::new(next)
      } else {
        Arc::clone(current)
      }
    });
    removed
  }

  /// Applies `f` to every record in one atomic step, dropping those mapped to `None`.
  pub fn sweep<F>(&self, mut f: F) -> Sweep
  where
    F: FnMut(&NoteRecord) -> Option<NoteRecord>,
  {
    let mut sweep = Sweep::default();
    self.notes.rcu(|current| {
      sweep = Sweep::default();
      let mut next = NoteMap::new();
      for (key, record) in current.iter() {
        match f(record) {
          Some(record) => {
            next.insert(*key, record);
            sweep.kept += 1;
          }
          None => sweep.evicted.push(*key),
        }
      }
      next
    });
    sweep
  }

  pub fn clear(&self) {
    self.notes.store(Arc::new(NoteMap::new()));
  }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot {
      notes: self.notes.load_full(),
    }
  }
}

impl Default for NoteTable {
  fn default() -> NoteTable {
    NoteTable::new()
  }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use failure::Fail;
use log::{info, trace, warn};

use crate::config::Tracker as TrackerConfig;
use crate::notes::{NoteEvent, NoteRecord, NoteTable, Snapshot, Sweep, TableError};
use crate::time::Tempo;

#[derive(Debug, Fail)]
pub enum TrackerError {
  #[fail(display = "Note-off without a live note-on: {}", cause)]
  MissingKey { cause: TableError },
}

/// Receives note events from the playback thread.
pub trait NoteSink: Send + Sync {
  fn send(&self, event: NoteEvent);
}

/// Current playback tempo, as reported by the sequencer.
pub trait TempoSource: Send + Sync {
  fn tempo(&self) -> Tempo;
}

impl TempoSource for Tempo {
  fn tempo(&self) -> Tempo {
    *self
  }
}

pub struct NoteTracker {
  table: NoteTable,
  fade_frames: u32,
  tempo_source: Arc<dyn TempoSource>,
  missing_key_faults: AtomicU64,
}

impl NoteTracker {
  pub fn new(config: &TrackerConfig, tempo_source: Arc<dyn TempoSource>) -> NoteTracker {
    info!(
      "Creating the note tracker (fading for {} frames) ...",
      config.fade_frames
    );

    NoteTracker {
      table: NoteTable::new(),
      fade_frames: config.fade_frames,
      tempo_source,
      missing_key_faults: AtomicU64::new(0),
    }
  }

  pub fn fade_frames(&self) -> u32 {
    self.fade_frames
  }

  /// Applies a note event to the table.
  ///
  /// A note-on with velocity replaces whatever was tracked for its key.
  /// A release marks the note as fading; releasing an untracked key is
  /// counted and reported as [`TrackerError::MissingKey`].
  pub fn on_event(&self, event: NoteEvent) -> Result<(), TrackerError> {
    if event.is_release() {
      self
        .table
        .update(event.key(), NoteRecord::released)
        .map(|_record| ())
        .map_err(|cause| {
          self.missing_key_faults.fetch_add(1, Ordering::Relaxed);
          TrackerError::MissingKey { cause }
        })
    } else {
      self.table.put(NoteRecord::sounding(
        event.channel,
        event.pitch,
        event.velocity,
      ));
      Ok(())
    }
  }

  /// Ages every tracked note by one frame and evicts the expired ones.
  pub fn advance(&self) -> Sweep {
    let fade_frames = self.fade_frames;
    let sweep = self.table.sweep(|record| record.advanced(fade_frames));
    for key in sweep.evicted.iter() {
      trace!("Evicted note {:?}", key);
    }
    sweep
  }

  pub fn snapshot(&self) -> Snapshot {
    self.table.snapshot()
  }

  pub fn tempo(&self) -> f64 {
    self.tempo_source.tempo().bpm()
  }

  pub fn missing_key_faults(&self) -> u64 {
    self.missing_key_faults.load(Ordering::Relaxed)
  }

  pub fn clear(&self) {
    self.table.clear();
  }
}

impl NoteSink for NoteTracker {
  fn send(&self, event: NoteEvent) {
    if let Err(err) = self.on_event(event) {
      warn!("Ignoring {:?}: {}", event, err);
    }
  }
}

#[cfg(test)]
mod test {

  use std::collections::HashSet;
  use std::sync::Arc;
  use std::thread;

  use super::{NoteSink, NoteTracker, TrackerError};
  use crate::config::Tracker as TrackerConfig;
  use crate::notes::{NoteEvent, NoteKey, NoteRecord, NoteState};
  use crate::time::Tempo;

  fn tracker() -> NoteTracker {
    NoteTracker::new(&TrackerConfig::default(), Arc::new(Tempo::new(120.0)))
  }

  fn records(tracker: &NoteTracker) -> Vec<NoteRecord> {
    tracker.snapshot().iter().copied().collect()
  }

  #[test]
  pub fn note_on_is_tracked() {
    let tracker = tracker();
    tracker.on_event(NoteEvent::note_on(0, 60, 100)).unwrap();
    assert_eq!(records(&tracker), vec![NoteRecord::sounding(0, 60, 100)]);
  }

  #[test]
  pub fn note_off_fades_then_evicts() {
    let tracker = tracker();
    tracker.on_event(NoteEvent::note_on(0, 60, 100)).unwrap();
    tracker.on_event(NoteEvent::note_off(0, 60)).unwrap();

    let key = NoteKey::new(0, 60);
    assert_eq!(
      tracker.snapshot().get(&key).unwrap().state,
      NoteState::Fading { age: 0 }
    );

    for _ in 0..10 {
      tracker.advance();
    }
    assert_eq!(
      tracker.snapshot().get(&key).unwrap().state,
      NoteState::Fading { age: 10 }
    );

    let sweep = tracker.advance();
    assert_eq!(sweep.evicted, vec![key]);
    assert!(tracker.snapshot().is_empty());
  }

  #[test]
  pub fn zero_velocity_note_on_releases() {
    let tracker = tracker();
    tracker.on_event(NoteEvent::note_on(2, 48, 70)).unwrap();
    tracker.on_event(NoteEvent::note_on(2, 48, 0)).unwrap();
    let record = *tracker.snapshot().get(&NoteKey::new(2, 48)).unwrap();
    assert_eq!(record.state, NoteState::Fading { age: 0 });
    assert_eq!(record.velocity, 70);
  }

  #[test]
  pub fn missing_key_is_counted() {
    let tracker = tracker();
    tracker.on_event(NoteEvent::note_on(0, 60, 100)).unwrap();
    match tracker.on_event(NoteEvent::note_off(0, 61)) {
      Err(TrackerError::MissingKey { .. }) => {}
      Ok(()) => panic!("Expected a missing key fault"),
    }
    assert_eq!(tracker.missing_key_faults(), 1);
    assert_eq!(records(&tracker), vec![NoteRecord::sounding(0, 60, 100)]);
  }

  #[test]
  pub fn sink_swallows_missing_key() {
    let tracker = tracker();
    tracker.send(NoteEvent::note_off(0, 61));
    tracker.send(NoteEvent::note_on(0, 61, 0));
    assert_eq!(tracker.missing_key_faults(), 2);
    assert!(tracker.snapshot().is_empty());
  }

  #[test]
  pub fn repeated_note_off_keeps_age() {
    let tracker = tracker();
    tracker.on_event(NoteEvent::note_on(0, 60, 100)).unwrap();
    tracker.on_event(NoteEvent::note_off(0, 60)).unwrap();
    tracker.advance();
    tracker.advance();
    tracker.advance();
    tracker.on_event(NoteEvent::note_off(0, 60)).unwrap();
    tracker.on_event(NoteEvent::note_on(0, 60, 0)).unwrap();
    let record = *tracker.snapshot().get(&NoteKey::new(0, 60)).unwrap();
    assert_eq!(record.state, NoteState::Fading { age: 3 });
    assert_eq!(tracker.missing_key_faults(), 0);
  }

  #[test]
  pub fn retrigger_overrides_fade() {
    for age in 0..10 {
      let tracker = tracker();
      tracker.on_event(NoteEvent::note_on(0, 60, 100)).unwrap();
      tracker.on_event(NoteEvent::note_off(0, 60)).unwrap();
      for _ in 0..age {
        tracker.advance();
      }
      assert_eq!(
        tracker.snapshot().get(&NoteKey::new(0, 60)).unwrap().age(),
        Some(age)
      );
      tracker.on_event(NoteEvent::note_on(0, 60, 33)).unwrap();
      assert_eq!(records(&tracker), vec![NoteRecord::sounding(0, 60, 33)]);
    }
  }

  #[test]
  pub fn note_on_overwrites_sounding_note() {
    let tracker = tracker();
    tracker.on_event(NoteEvent::note_on(0, 60, 100)).unwrap();
    tracker.advance();
    tracker.on_event(NoteEvent::note_on(0, 60, 50)).unwrap();
    assert_eq!(records(&tracker), vec![NoteRecord::sounding(0, 60, 50)]);
  }

  #[test]
  pub fn sounding_notes_are_held() {
    let tracker = tracker();
    tracker.on_event(NoteEvent::note_on(0, 60, 100)).unwrap();
    for _ in 0..25 {
      tracker.advance();
    }
    let record = *tracker.snapshot().get(&NoteKey::new(0, 60)).unwrap();
    assert_eq!(record.held, 25);
    assert!(record.is_sounding());
  }

  #[test]
  pub fn channels_are_independent() {
    let tracker = tracker();
    tracker.on_event(NoteEvent::note_on(0, 60, 100)).unwrap();
    tracker.on_event(NoteEvent::note_on(1, 60, 90)).unwrap();
    tracker.on_event(NoteEvent::note_off(0, 60)).unwrap();
    let snapshot = tracker.snapshot();
    assert!(snapshot.get(&NoteKey::new(0, 60)).unwrap().is_fading());
    assert!(snapshot.get(&NoteKey::new(1, 60)).unwrap().is_sounding());
  }

  #[test]
  pub fn custom_fade_frames() {
    let config = TrackerConfig { fade_frames: 2 };
    let tracker = NoteTracker::new(&config, Arc::new(Tempo::new(120.0)));
    tracker.on_event(NoteEvent::note_on(0, 60, 100)).unwrap();
    tracker.on_event(NoteEvent::note_off(0, 60)).unwrap();
    tracker.advance();
    tracker.advance();
    assert_eq!(tracker.snapshot().len(), 1);
    tracker.advance();
    assert!(tracker.snapshot().is_empty());
  }

  #[test]
  pub fn tempo_is_passed_through() {
    let tracker = NoteTracker::new(&TrackerConfig::default(), Arc::new(Tempo::new(93.5)));
    assert_eq!(tracker.tempo(), 93.5);
  }

  #[test]
  pub fn concurrent_events_and_frames() {
    const ROUNDS: u8 = 200;
    const CHANNELS: u8 = 4;

    let tracker = Arc::new(tracker());

    let events_tracker = tracker.clone();
    let events = thread::spawn(move || {
      for round in 0..ROUNDS {
        for channel in 0..CHANNELS {
          for pitch in 0..128u8 {
            let velocity = pitch % 127 + 1;
            events_tracker.send(NoteEvent::note_on(channel, pitch, velocity));
          }
          for pitch in (round % 2..128u8).step_by(2) {
            events_tracker.send(NoteEvent::note_off(channel, pitch));
          }
        }
      }
    });

    let frames_tracker = tracker.clone();
    let frames = thread::spawn(move || {
      for _ in 0..500 {
        frames_tracker.advance();
        let snapshot = frames_tracker.snapshot();
        let mut keys = HashSet::new();
        for record in snapshot.iter() {
          assert!(keys.insert(record.key()));
          assert_eq!(record.velocity, record.pitch % 127 + 1);
          assert!(record.channel < CHANNELS);
          if let Some(age) = record.age() {
            assert!(age <= 10);
          }
        }
      }
    });

    events.join().unwrap();
    frames.join().unwrap();

    assert_eq!(tracker.missing_key_faults(), 0);
    assert!(tracker.snapshot().len() <= CHANNELS as usize * 128);

    for channel in 0..CHANNELS {
      for pitch in 0..128u8 {
        tracker.send(NoteEvent::note_on(channel, pitch, 1));
        tracker.send(NoteEvent::note_off(channel, pitch));
      }
    }
    assert_eq!(tracker.snapshot().len(), CHANNELS as usize * 128);
    for _ in 0..11 {
      tracker.advance();
    }
    assert!(tracker.snapshot().is_empty());
    assert_eq!(tracker.missing_key_faults(), 0);
  }
}

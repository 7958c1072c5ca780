pub mod event;
pub mod table;

pub use self::event::{NoteEvent, NoteEventKind};
pub use self::table::{NoteTable, Snapshot, Sweep, TableError};

pub type Channel = u8;
pub type Pitch = u8;
pub type Velocity = u8;

/// Largest pitch or velocity a MIDI data byte can carry.
pub const MAX_DATA_VALUE: u8 = 127;

pub(crate) fn data_value(value: u8) -> u8 {
  value.min(MAX_DATA_VALUE)
}

/// Identity of a tracked note: at most one live record exists per key.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct NoteKey {
  pub channel: Channel,
  pub pitch: Pitch,
}

impl NoteKey {
  pub fn new(channel: Channel, pitch: Pitch) -> NoteKey {
    NoteKey { channel, pitch }
  }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NoteState {
  Sounding,
  Fading { age: u32 },
}

/// A tracked note. Records are values: every transition builds a new one.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct NoteRecord {
  pub channel: Channel,
  pub pitch: Pitch,
  pub velocity: Velocity,
  /// Advance cycles spent sounding.
  pub held: u32,
  pub state: NoteState,
}

impl NoteRecord {
  pub fn sounding(channel: Channel, pitch: Pitch, velocity: Velocity) -> NoteRecord {
    NoteRecord {
      channel,
      pitch: data_value(pitch),
      velocity: data_value(velocity),
      held: 0,
      state: NoteState::Sounding,
    }
  }

  pub fn key(&self) -> NoteKey {
    NoteKey::new(self.channel, self.pitch)
  }

  pub fn is_sounding(&self) -> bool {
    self.state == NoteState::Sounding
  }

  pub fn is_fading(&self) -> bool {
    !self.is_sounding()
  }

  pub fn age(&self) -> Option<u32> {
    match self.state {
      NoteState::Sounding => None,
      NoteState::Fading { age } => Some(age),
    }
  }

  /// The record after a note-off. Releasing a fading note leaves it untouched.
  pub fn released(&self) -> NoteRecord {
    match self.state {
      NoteState::Sounding => NoteRecord {
        state: NoteState::Fading { age: 0 },
        ..*self
      },
      NoteState::Fading { .. } => *self,
    }
  }

  /// The record after one advance cycle, or `None` once the fade exceeds `fade_frames`.
  pub fn advanced(&self, fade_frames: u32) -> Option<NoteRecord> {
    match self.state {
      NoteState::Sounding => Some(NoteRecord {
        held: self.held.saturating_add(1),
        ..*self
      }),
      NoteState::Fading { age } if age < fade_frames => Some(NoteRecord {
        state: NoteState::Fading { age: age + 1 },
        ..*self
      }),
      NoteState::Fading { .. } => None,
    }
  }
}

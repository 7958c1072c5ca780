use crate::notes::{data_value, Channel, NoteKey, Pitch, Velocity};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NoteEventKind {
  NoteOn,
  NoteOff,
}

/// A decoded note event as delivered by the sequencer.
///
/// `channel` is zero based (the device channel minus one). Pitch and
/// velocity are clamped to the 7 bit MIDI data range by the constructors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct NoteEvent {
  pub channel: Channel,
  pub pitch: Pitch,
  pub velocity: Velocity,
  pub kind: NoteEventKind,
}

impl NoteEvent {
  pub fn note_on(channel: Channel, pitch: Pitch, velocity: Velocity) -> NoteEvent {
    NoteEvent {
      channel,
      pitch: data_value(pitch),
      velocity: data_value(velocity),
      kind: NoteEventKind::NoteOn,
    }
  }

  pub fn note_off(channel: Channel, pitch: Pitch) -> NoteEvent {
    NoteEvent {
      channel,
      pitch: data_value(pitch),
      velocity: 0,
      kind: NoteEventKind::NoteOff,
    }
  }

  /// Builds an event from a one based device channel. Returns `None` for channel 0.
  pub fn from_device(
    device_channel: u8,
    pitch: Pitch,
    velocity: Velocity,
    kind: NoteEventKind,
  ) -> Option<NoteEvent> {
    device_channel.checked_sub(1).map(|channel| NoteEvent {
      channel,
      pitch: data_value(pitch),
      velocity: data_value(velocity),
      kind,
    })
  }

  pub fn key(&self) -> NoteKey {
    NoteKey::new(self.channel, self.pitch)
  }

  /// A note-off, or a note-on with zero velocity.
  pub fn is_release(&self) -> bool {
    self.kind == NoteEventKind::NoteOff || self.velocity == 0
  }
}

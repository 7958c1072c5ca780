use std::time::Duration;

pub const DEFAULT_BPM: f64 = 120.0;

const SECONDS_PER_MINUTE: f64 = 60.0;
const MICROS_PER_MINUTE: f64 = 60_000_000.0;

/// Tempo in beats per minute.
#[derive(Debug, PartialEq, PartialOrd, Clone, Copy)]
pub struct Tempo(f64);

impl Tempo {
  pub fn new(bpm: f64) -> Tempo {
    Tempo(bpm)
  }

  /// Tempo from the length of one beat in microseconds (MIDI set-tempo).
  pub fn from_micros_per_beat(micros: u32) -> Option<Tempo> {
    if micros > 0 {
      Some(Tempo(MICROS_PER_MINUTE / f64::from(micros)))
    } else {
      None
    }
  }

  pub fn bpm(&self) -> f64 {
    self.0
  }

  /// `None` when the result is not a representable duration.
  pub fn beats_to_duration(&self, beats: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(beats * SECONDS_PER_MINUTE / self.0).ok()
  }
}

impl Default for Tempo {
  fn default() -> Tempo {
    Tempo(DEFAULT_BPM)
  }
}

impl From<Tempo> for f64 {
  fn from(item: Tempo) -> Self {
    item.0
  }
}

impl From<f64> for Tempo {
  fn from(bpm: f64) -> Self {
    Tempo(bpm)
  }
}

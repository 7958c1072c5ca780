use std::f64::consts::E;

use swans_core::{NoteRecord, Snapshot};

use crate::config::Visuals as VisualsConfig;

/// Visual parameters derived from one snapshot of the tracked notes.
#[derive(Debug, Clone)]
pub struct Frame {
  pub bars: Vec<f64>,
  pub aberration: f64,
  pub tempo: f64,
  pub notes: usize,
}

impl Frame {
  pub fn new(config: &VisualsConfig) -> Frame {
    Frame {
      bars: vec![0.0; config.bars],
      aberration: 1.0,
      tempo: 0.0,
      notes: 0,
    }
  }

  /// Recomputes the frame in place, reusing the bar buffer.
  pub fn update(&mut self, snapshot: &Snapshot, tempo: f64, config: &VisualsConfig) {
    bar_heights(snapshot, config, &mut self.bars);
    self.aberration = aberration_factor(snapshot, config);
    self.tempo = tempo;
    self.notes = snapshot.len();
  }

  pub fn peak(&self) -> f64 {
    self.bars.iter().cloned().fold(0.0, f64::max)
  }
}

/// One bar per pitch, as tall as the loudest note tracked for it.
pub fn bar_heights(snapshot: &Snapshot, config: &VisualsConfig, bars: &mut [f64]) {
  for bar in bars.iter_mut() {
    *bar = 0.0;
  }
  for record in snapshot.iter() {
    if let Some(bar) = bars.get_mut(record.pitch as usize) {
      *bar = bar.max(f64::from(record.velocity) * config.bar_scale);
    }
  }
}

fn drives_aberration(record: &NoteRecord, config: &VisualsConfig) -> bool {
  record.pitch < config.aberration_max_pitch && record.velocity > config.aberration_min_velocity
}

/// Low and loud notes push the chromatic aberration up exponentially.
pub fn aberration_factor(snapshot: &Snapshot, config: &VisualsConfig) -> f64 {
  snapshot
    .iter()
    .filter(|record| drives_aberration(record, config))
    .map(|record| E.powf(f64::from(record.velocity) / config.aberration_divisor))
    .fold(1.0, f64::max)
}

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Select};
use log::{debug, info};

use swans_core::NoteTracker;

use crate::config::{Render as RenderConfig, Visuals as VisualsConfig};
use crate::visuals::Frame;

/// Headless render loop: reads the tracked notes once per frame and ages them.
pub struct Renderer {
  tracker: Arc<NoteTracker>,
  render: RenderConfig,
  visuals: VisualsConfig,
  frame: Frame,
  frames: u64,
}

impl Renderer {
  pub fn new(tracker: Arc<NoteTracker>, render: RenderConfig, visuals: VisualsConfig) -> Renderer {
    let frame = Frame::new(&visuals);
    Renderer {
      tracker,
      render,
      visuals,
      frame,
      frames: 0,
    }
  }

  #[cfg(test)]
  pub fn frames(&self) -> u64 {
    self.frames
  }

  #[cfg(test)]
  pub fn frame(&self) -> &Frame {
    &self.frame
  }

  fn frame_period(&self) -> Duration {
    Duration::from_secs(1) / self.render.frame_rate.max(1)
  }

  /// Renders until `finished_rx` fires (or disconnects), then keeps rendering
  /// while the remaining notes fade out.
  pub fn run(&mut self, finished_rx: &Receiver<()>) -> u64 {
    info!("Rendering at {} fps ...", self.render.frame_rate);

    let ticker = crossbeam_channel::tick(self.frame_period());

    let mut sel = Select::new();
    let tick_index = sel.recv(&ticker);
    let finished_index = sel.recv(finished_rx);

    loop {
      match sel.ready() {
        index if index == tick_index => {
          if ticker.try_recv().is_ok() {
            self.render_frame();
          }
        }
        index if index == finished_index => {
          drop(finished_rx.try_recv());
          break;
        }
        _ => unreachable!(),
      }
    }

    debug!("Playback ended, letting notes fade out");

    let mut lingered = 0;
    while !self.tracker.snapshot().is_empty() && lingered < self.render.linger_frames {
      if ticker.recv().is_ok() {
        self.render_frame();
        lingered += 1;
      }
    }

    info!("Rendered {} frames", self.frames);
    self.frames
  }

  pub fn render_frame(&mut self) {
    let snapshot = self.tracker.snapshot();
    self
      .frame
      .update(&snapshot, self.tracker.tempo(), &self.visuals);
    debug!(
      "Frame {}: {} notes, peak {:.1}, aberration {:.2}, {:.1} BPM",
      self.frames,
      self.frame.notes,
      self.frame.peak(),
      self.frame.aberration,
      self.frame.tempo
    );
    self.tracker.advance();
    self.frames += 1;
  }
}

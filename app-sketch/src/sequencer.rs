use std::cmp::Ordering as CmpOrdering;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
#[cfg(test)]
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use failure::Fail;
use log::{debug, info, warn};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use swans_core::time::Tempo;
use swans_core::{NoteEvent, NoteEventKind, NoteSink, TempoSource};

use crate::config::Sequencer as SequencerConfig;

#[derive(Debug, Fail)]
pub enum SequencerError {
  #[fail(display = "MIDI sequencer unavailable: {}", cause)]
  DeviceUnavailable { cause: String },

  #[fail(display = "Invalid score: {}", cause)]
  InvalidScore { cause: String },

  #[fail(display = "Failed to create the Sequencer thread: {}", cause)]
  Start { cause: String },

  #[fail(display = "Failed to join the Sequencer thread")]
  Stop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreEvent {
  Note(NoteEvent),
  Tempo(Tempo),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
  /// Beats (quarter notes) from the start of the score.
  pub beat: f64,
  pub event: ScoreEvent,
}

/// Note and tempo events of a standard MIDI file, merged into one timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
  /// Tempo in effect when playback starts.
  pub tempo: Tempo,
  pub events: Vec<TimedEvent>,
}

impl Score {
  pub fn from_file(path: &str) -> Result<Score, SequencerError> {
    let bytes = fs::read(path).map_err(|err| SequencerError::DeviceUnavailable {
      cause: format!("{}: {}", path, err),
    })?;
    Self::from_bytes(bytes.as_slice())
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Score, SequencerError> {
    let smf = Smf::parse(bytes).map_err(|err| SequencerError::DeviceUnavailable {
      cause: err.to_string(),
    })?;
    Self::from_smf(&smf)
  }

  pub fn from_smf(smf: &Smf) -> Result<Score, SequencerError> {
    let ticks_per_beat = match smf.header.timing {
      Timing::Metrical(ticks) if ticks.as_int() > 0 => f64::from(ticks.as_int()),
      Timing::Metrical(_) => {
        return Err(SequencerError::InvalidScore {
          cause: "zero ticks per beat".to_string(),
        })
      }
      Timing::Timecode(fps, subframes) => {
        return Err(SequencerError::InvalidScore {
          cause: format!("timecode timing ({:?}, {} subframes)", fps, subframes),
        })
      }
    };

    let mut events = Vec::new();
    let mut track_start: u64 = 0;
    for track in smf.tracks.iter() {
      let mut ticks = track_start;
      for track_event in track.iter() {
        ticks += u64::from(track_event.delta.as_int());
        let beat = ticks as f64 / ticks_per_beat;
        if let Some(event) = Self::score_event(track_event.kind)? {
          events.push(TimedEvent { beat, event });
        }
      }
      // sequential files play one track after the other
      if smf.header.format == Format::Sequential {
        track_start = ticks;
      }
    }

    // stable, so events sharing a tick keep their file order
    events.sort_by(|a, b| a.beat.partial_cmp(&b.beat).unwrap_or(CmpOrdering::Equal));

    let tempo = events
      .iter()
      .take_while(|timed| timed.beat == 0.0)
      .filter_map(|timed| match timed.event {
        ScoreEvent::Tempo(tempo) => Some(tempo),
        ScoreEvent::Note(_) => None,
      })
      .last()
      .unwrap_or_default();

    Ok(Score { tempo, events })
  }

  fn score_event(kind: TrackEventKind) -> Result<Option<ScoreEvent>, SequencerError> {
    match kind {
      TrackEventKind::Meta(MetaMessage::Tempo(micros)) => Tempo::from_micros_per_beat(micros.as_int())
        .map(|tempo| Some(ScoreEvent::Tempo(tempo)))
        .ok_or_else(|| SequencerError::InvalidScore {
          cause: "zero microseconds per beat".to_string(),
        }),
      TrackEventKind::Midi { channel, message } => {
        // midly channels are the zero based wire value
        let device_channel = channel.as_int() + 1;
        let note = match message {
          MidiMessage::NoteOn { key, vel } => {
            NoteEvent::from_device(device_channel, key.as_int(), vel.as_int(), NoteEventKind::NoteOn)
          }
          MidiMessage::NoteOff { key, .. } => {
            NoteEvent::from_device(device_channel, key.as_int(), 0, NoteEventKind::NoteOff)
          }
          _ => None,
        };
        Ok(note.map(ScoreEvent::Note))
      }
      _ => Ok(None),
    }
  }

  pub fn notes(&self) -> usize {
    self
      .events
      .iter()
      .filter(|timed| match timed.event {
        ScoreEvent::Note(event) => !event.is_release(),
        ScoreEvent::Tempo(_) => false,
      })
      .count()
  }
}

/// Tempo of the running playback, shared with the tracker.
pub struct SequencerClock {
  bpm: AtomicU64,
}

impl SequencerClock {
  pub fn new(tempo: Tempo) -> SequencerClock {
    SequencerClock {
      bpm: AtomicU64::new(tempo.bpm().to_bits()),
    }
  }

  pub fn set_tempo(&self, tempo: Tempo) {
    self.bpm.store(tempo.bpm().to_bits(), Ordering::Relaxed);
  }
}

impl TempoSource for SequencerClock {
  fn tempo(&self) -> Tempo {
    Tempo::new(f64::from_bits(self.bpm.load(Ordering::Relaxed)))
  }
}

pub enum Protocol {
  Stop,
}

struct SequencerThread {
  events: Vec<TimedEvent>,
  clock: Arc<SequencerClock>,
  sink: Arc<dyn NoteSink>,
}

impl SequencerThread {
  fn play(&self, protocol_rx: Receiver<Protocol>, finished_tx: Sender<()>) {
    // timing restarts at every tempo change
    let mut segment_start = Instant::now();
    let mut segment_beat = 0.0;

    for timed in self.events.iter() {
      let tempo = self.clock.tempo();
      let due = tempo
        .beats_to_duration(timed.beat - segment_beat)
        .and_then(|offset| segment_start.checked_add(offset));

      let due = match due {
        Some(due) => due,
        None => {
          warn!(
            "Beat {} can not be scheduled at {} BPM, ending playback",
            timed.beat,
            tempo.bpm()
          );
          break;
        }
      };

      let wait = due.saturating_duration_since(Instant::now());
      match protocol_rx.recv_timeout(wait) {
        Ok(Protocol::Stop) | Err(RecvTimeoutError::Disconnected) => {
          debug!("Playback interrupted at beat {}", timed.beat);
          return;
        }
        Err(RecvTimeoutError::Timeout) => match timed.event {
          ScoreEvent::Note(event) => self.sink.send(event),
          ScoreEvent::Tempo(tempo) => {
            debug!("Tempo {} BPM at beat {}", tempo.bpm(), timed.beat);
            self.clock.set_tempo(tempo);
            segment_start = due;
            segment_beat = timed.beat;
          }
        },
      }
    }
    debug!("Playback finished");
    drop(finished_tx.send(()));
  }
}

/// Plays a standard MIDI file on its own thread.
pub struct Sequencer {
  score: Score,
  clock: Arc<SequencerClock>,
}

impl Sequencer {
  pub fn open(config: &SequencerConfig) -> Result<Sequencer, SequencerError> {
    info!("Opening the sequencer with {} ...", config.midi_file);
    Score::from_file(config.midi_file.as_str()).map(Sequencer::new)
  }

  pub fn new(score: Score) -> Sequencer {
    let clock = Arc::new(SequencerClock::new(score.tempo));
    Sequencer { score, clock }
  }

  pub fn clock(&self) -> Arc<SequencerClock> {
    self.clock.clone()
  }

  pub fn start(self, sink: Arc<dyn NoteSink>) -> Result<Playback, SequencerError> {
    info!(
      "Starting playback of {} notes at {} BPM ...",
      self.score.notes(),
      self.score.tempo.bpm()
    );

    let (protocol_tx, protocol_rx) = crossbeam_channel::bounded::<Protocol>(1);
    let (finished_tx, finished_rx) = crossbeam_channel::bounded::<()>(1);

    let sequencer_thread = SequencerThread {
      events: self.score.events,
      clock: self.clock,
      sink,
    };

    thread::Builder::new()
      .name("sequencer".into())
      .spawn(move || sequencer_thread.play(protocol_rx, finished_tx))
      .map_err(|err| SequencerError::Start {
        cause: err.to_string(),
      })
      .map(|handler| Playback {
        handler,
        protocol_tx,
        finished_rx,
      })
  }
}

pub struct Playback {
  handler: JoinHandle<()>,
  protocol_tx: Sender<Protocol>,
  finished_rx: Receiver<()>,
}

impl Playback {
  /// Receives once the whole score has been delivered.
  pub fn finished(&self) -> &Receiver<()> {
    &self.finished_rx
  }

  #[cfg(test)]
  pub fn wait_finished(&self, timeout: Duration) -> bool {
    self.finished_rx.recv_timeout(timeout).is_ok()
  }

  pub fn stop(self) -> Result<(), SequencerError> {
    info!("Stopping playback ...");

    // the thread may already be gone after finishing the score
    drop(self.protocol_tx.send(Protocol::Stop));
    self.handler.join().map_err(|_| SequencerError::Stop)
  }
}

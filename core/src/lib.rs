pub mod config;
pub mod notes;
pub mod time;
pub mod tracker;

pub use crate::notes::{NoteEvent, NoteEventKind, NoteKey, NoteRecord, NoteState, NoteTable, Snapshot};
pub use crate::tracker::{NoteSink, NoteTracker, TempoSource, TrackerError};

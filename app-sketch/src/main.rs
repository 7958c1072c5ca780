use std::sync::Arc;

use log::{debug, info, warn};

use failure::{Error, Fail};

use swans_core::{config::Config as CoreConfig, NoteTracker};

mod config;
use crate::config::Config as AppConfig;

mod renderer;
use crate::renderer::Renderer;

mod sequencer;
use crate::sequencer::{Sequencer, SequencerError};

mod visuals;

const APP_NAME: &str = "Swans";

const SWANS_CONFIG: &str = "SWANS_CONFIG";
const DEFAULT_SWANS_CONFIG: &str = "swans.toml";

const SWANS_LOG_CONFIG: &str = "SWANS_LOG_CONFIG";
const DEFAULT_SWANS_LOG_CONFIG: &str = "log4rs.yaml";

#[derive(Debug, Fail)]
enum MainError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },

  #[fail(display = "Failed to open the sequencer: {}", cause)]
  OpenSequencer { cause: SequencerError },
}

fn main() -> Result<(), Error> {
  init_logging()?;

  info!("Starting {} ...", APP_NAME);

  let (core_config, app_config) = init_config()?;

  let sequencer = init_sequencer(&app_config)?;

  let tracker = Arc::new(NoteTracker::new(&core_config.tracker, sequencer.clock()));

  let playback = sequencer.start(tracker.clone())?;

  let mut renderer = Renderer::new(tracker.clone(), app_config.render, app_config.visuals);
  renderer.run(playback.finished());

  playback.stop()?;

  let faults = tracker.missing_key_faults();
  if faults > 0 {
    warn!("{} note-off events had no matching note-on", faults);
  }

  tracker.clear();

  Ok(())
}

fn init_logging() -> Result<(), Error> {
  let log_config_path =
    std::env::var(SWANS_LOG_CONFIG).unwrap_or_else(|_| DEFAULT_SWANS_LOG_CONFIG.to_string());

  log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
    MainError::LoggingInit {
      cause: err.to_string(),
    }
  })?;

  Ok(())
}

fn init_config() -> Result<(CoreConfig, AppConfig), Error> {
  let config_path =
    std::env::var(SWANS_CONFIG).unwrap_or_else(|_| DEFAULT_SWANS_CONFIG.to_string());

  info!("Loading configuration from {} ...", config_path);
  let core_config = CoreConfig::from_file(config_path.as_str())?;
  let app_config = AppConfig::from_file(config_path.as_str())?;
  debug!("{:#?}", core_config);
  debug!("{:#?}", app_config);

  Ok((core_config, app_config))
}

fn init_sequencer(app_config: &AppConfig) -> Result<Sequencer, Error> {
  let sequencer =
    Sequencer::open(&app_config.sequencer).map_err(|cause| MainError::OpenSequencer { cause })?;
  Ok(sequencer)
}

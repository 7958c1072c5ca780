use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
  pub sequencer: Sequencer,
  pub render: Render,
  pub visuals: Visuals,
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let path_str = path.into();
    let mut file = File::open(path_str)?;
    file.read_to_string(&mut content)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
  }

  #[allow(dead_code)]
  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Sequencer {
  /// Standard MIDI file to play.
  pub midi_file: String,
}

impl Default for Sequencer {
  fn default() -> Sequencer {
    Sequencer {
      midi_file: "swans.mid".to_string(),
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Render {
  pub frame_rate: u32,
  /// Frames to keep rendering after playback ends, while notes fade out.
  pub linger_frames: u32,
}

impl Default for Render {
  fn default() -> Render {
    Render {
      frame_rate: 60,
      linger_frames: 120,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Visuals {
  pub bars: usize,
  pub bar_scale: f64,
  pub aberration_max_pitch: u8,
  pub aberration_min_velocity: u8,
  pub aberration_divisor: f64,
}

impl Default for Visuals {
  fn default() -> Visuals {
    Visuals {
      bars: 128,
      bar_scale: 1.5,
      aberration_max_pitch: 67,
      aberration_min_velocity: 67,
      aberration_divisor: 20.0,
    }
  }
}

use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

pub const DEFAULT_FADE_FRAMES: u32 = 10;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Tracker {
  /// Number of advance cycles a released note stays visible before eviction.
  pub fade_frames: u32,
}

impl Default for Tracker {
  fn default() -> Tracker {
    Tracker {
      fade_frames: DEFAULT_FADE_FRAMES,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
  pub tracker: Tracker,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      tracker: Tracker::default(),
    }
  }
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

  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}

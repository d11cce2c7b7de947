use crate::error::{AudioloopError, Result};
use crate::pipeline::MAX_REPEAT_COUNT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default number of repetitions when none is given on the command line.
    pub repeat_count: u32,
    /// Show a progress bar during jobs.
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repeat_count: 10,
            show_progress: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                if let Ok(file_config) = toml::from_str::<Config>(&contents) {
                    config = file_config;
                }
            }
        }

        // Override with environment variables
        if let Ok(count) = std::env::var("AUDIOLOOP_REPEAT_COUNT") {
            if let Ok(c) = count.parse() {
                config.repeat_count = c;
            }
        }
        if let Ok(show) = std::env::var("AUDIOLOOP_SHOW_PROGRESS") {
            if let Ok(s) = show.parse() {
                config.show_progress = s;
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.repeat_count < 1 || self.repeat_count > MAX_REPEAT_COUNT {
            return Err(AudioloopError::InvalidRepeatCount(self.repeat_count));
        }
        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("audioloop").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.repeat_count, 10);
        assert!(config.show_progress);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_repeat_count() {
        let mut config = Config::default();
        config.repeat_count = 0;
        assert!(config.validate().is_err());
        config.repeat_count = 101;
        assert!(config.validate().is_err());
        config.repeat_count = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str("repeat_count = 4").unwrap();
        assert_eq!(config.repeat_count, 4);
        assert!(config.show_progress);
    }
}

use crate::Result;
use camino::Utf8Path;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the data directory.
pub const CONFIG_FILE_NAME: &str = "tatoeba-sync.toml";

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root of the download site
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Duration a directory listing is reused before it is read again
    #[serde(default = "default_listing_cache_ttl", with = "humantime_serde")]
    pub listing_cache_ttl: Duration,

    /// Bytes buffered per output file while splitting
    #[serde(default = "default_split_buffer_bytes")]
    pub split_buffer_bytes: usize,

    /// Whether new files are compared with their previous version
    #[serde(default = "default_compute_diffs")]
    pub compute_diffs: bool,
}

fn default_base_url() -> String {
    "https://downloads.tatoeba.org".to_string()
}

const fn default_listing_cache_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

const fn default_split_buffer_bytes() -> usize {
    1024 * 1024
}

const fn default_compute_diffs() -> bool {
    true
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `tatoeba-sync.toml` in `data_dir` is used when it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds invalid values
    pub fn load(data_dir: &Path, config_path: Option<&Utf8Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.as_std_path().to_path_buf(), text)
        } else {
            let path = data_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{}'", path.display())),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{}'", final_path.display()))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        if let Some(parent) = output_path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{parent}'"))?;
        }

        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// The parsed download site root.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).into_app_err_with(|| format!("invalid base_url '{}'", self.base_url))
    }

    fn validate(&self) -> Result<()> {
        let _ = self.base_url()?;

        if self.split_buffer_bytes == 0 {
            bail!("split_buffer_bytes must be greater than zero");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

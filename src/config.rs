//! Settings file and command line overrides
//!
//! Reads flat `KEY = value` settings from `settings.toml`, either next to the
//! working directory or in ~/.config/enviromon/. Settings are resolved once
//! at startup and never change while the loop runs.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::display::{DisplayMode, Rotation};
use crate::sensors::Metric;
use crate::telemetry::UploadMode;
use crate::units::TempUnit;

const FILE_NAME: &str = "settings.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("AIO_USERNAME and AIO_KEY must be set when AIO_UPLOAD is '{0}'")]
    MissingCredentials(UploadMode),

    #[error("--uploads and --cron need uploads enabled (AIO_UPLOAD is 'no')")]
    UploadLimitWithoutUploads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Error,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Error => "error",
        }
    }
}

/// On/off flag that also accepts yes/no, true/false and 0/1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawToggle")]
pub struct Toggle(pub bool);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawToggle {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl TryFrom<RawToggle> for Toggle {
    type Error = String;

    fn try_from(raw: RawToggle) -> Result<Self, Self::Error> {
        match raw {
            RawToggle::Bool(b) => Ok(Toggle(b)),
            RawToggle::Int(i) => Ok(Toggle(i != 0)),
            RawToggle::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "on" | "yes" | "true" | "1" => Ok(Toggle(true)),
                "off" | "no" | "false" | "0" => Ok(Toggle(false)),
                other => Err(format!("expected on or off, got '{}'", other)),
            },
        }
    }
}

/// Resolved settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "AIO_USERNAME")]
    pub aio_username: Option<String>,
    #[serde(rename = "AIO_KEY")]
    pub aio_key: Option<String>,
    #[serde(rename = "AIO_UPLOAD")]
    pub aio_upload: UploadMode,
    #[serde(rename = "FEED_TEMPS")]
    pub feed_temps: String,
    #[serde(rename = "FEED_PRESS")]
    pub feed_press: String,
    #[serde(rename = "FEED_HUMID")]
    pub feed_humid: String,
    #[serde(rename = "UNITS_TEMPS")]
    pub units_temps: TempUnit,
    #[serde(rename = "ROTATION")]
    pub rotation: Rotation,
    #[serde(rename = "DISPLAY")]
    pub display: DisplayMode,
    /// Seconds before the first upload
    #[serde(rename = "DELAY")]
    pub delay: u64,
    /// Seconds between uploads after the first one, defaults to `DELAY`
    #[serde(rename = "FREQ")]
    pub freq: Option<u64>,
    /// Seconds between sensor reads
    #[serde(rename = "WAIT")]
    pub wait: u64,
    #[serde(rename = "THROTTLE")]
    pub throttle: u64,
    #[serde(rename = "PROGRESS")]
    pub progress: Toggle,
    /// Seconds of inactivity before the display blanks, 0 = never
    #[serde(rename = "SLEEP")]
    pub sleep: u64,
    #[serde(rename = "LOGLVL")]
    pub log_level: LogLevel,
    #[serde(rename = "LOGFILE")]
    pub log_file: Option<PathBuf>,
    #[serde(rename = "ROUNDING")]
    pub rounding: u32,
    /// CPU heat compensation factor, 0 = off
    #[serde(rename = "TEMP_COMP")]
    pub temp_comp: f64,
    #[serde(rename = "CPU_TEMPS")]
    pub cpu_temps: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            aio_username: None,
            aio_key: None,
            aio_upload: UploadMode::Yes,
            feed_temps: "temperature".to_string(),
            feed_press: "pressure".to_string(),
            feed_humid: "humidity".to_string(),
            units_temps: TempUnit::Celsius,
            rotation: Rotation::R0,
            display: DisplayMode::Sparkles,
            delay: 59,
            freq: None,
            wait: 1,
            throttle: 120,
            progress: Toggle(false),
            sleep: 600,
            log_level: LogLevel::Info,
            log_file: None,
            rounding: 2,
            temp_comp: 2.25,
            cpu_temps: 5,
        }
    }
}

/// Command line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub display: Option<DisplayMode>,
    pub progress: bool,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Default config file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("enviromon").join(FILE_NAME))
    }

    /// Settings file to use: `explicit` if given, else the first default
    /// location that exists
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        std::iter::once(PathBuf::from(FILE_NAME))
            .chain(Self::path())
            .find(|p| p.exists())
    }

    /// Load from `path`, or defaults when there is no file
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(settings)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let mut settings: Settings = toml::from_str(contents)?;
        settings.wait = settings.wait.max(1);
        Ok(settings)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(mode) = overrides.display {
            self.display = mode;
        }
        if overrides.progress {
            self.progress = Toggle(true);
        }
        if overrides.debug {
            self.log_level = LogLevel::Debug;
        }
        if overrides.log_file.is_some() {
            self.log_file = overrides.log_file;
        }
        self
    }

    /// Username and key, required whenever uploads are enabled
    pub fn credentials(&self) -> Result<Option<(&str, &str)>, ConfigError> {
        if !self.aio_upload.enabled() {
            return Ok(None);
        }
        match (self.aio_username.as_deref(), self.aio_key.as_deref()) {
            (Some(user), Some(key)) if !user.is_empty() && !key.is_empty() => Ok(Some((user, key))),
            _ => Err(ConfigError::MissingCredentials(self.aio_upload)),
        }
    }

    /// A limit on uploads only makes sense when there are uploads
    pub fn check_upload_limit(&self, limit: Option<u32>) -> Result<(), ConfigError> {
        if limit.is_some() && !self.aio_upload.enabled() {
            return Err(ConfigError::UploadLimitWithoutUploads);
        }
        Ok(())
    }

    pub fn feed_keys(&self) -> Vec<(Metric, String)> {
        vec![
            (Metric::Temperature, self.feed_temps.clone()),
            (Metric::Pressure, self.feed_press.clone()),
            (Metric::Humidity, self.feed_humid.clone()),
        ]
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay)
    }

    pub fn freq(&self) -> Duration {
        Duration::from_secs(self.freq.unwrap_or(self.delay))
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle)
    }

    /// `None` when blanking is disabled
    pub fn sleep(&self) -> Option<Duration> {
        (self.sleep > 0).then(|| Duration::from_secs(self.sleep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.aio_upload, UploadMode::Yes);
        assert_eq!(settings.display, DisplayMode::Sparkles);
        assert_eq!(settings.delay, 59);
        assert_eq!(settings.wait, 1);
        assert_eq!(settings.throttle, 120);
        assert_eq!(settings.sleep, 600);
        assert_eq!(settings.progress, Toggle(false));
        assert_eq!(settings.units_temps, TempUnit::Celsius);
        assert_eq!(settings.feed_temps, "temperature");
    }

    #[test]
    fn test_parse_keys() {
        let settings = Settings::parse(
            r#"
            AIO_USERNAME = "jane"
            AIO_KEY = "aio_abc"
            AIO_UPLOAD = "force"
            FEED_TEMPS = "enviro-temp"
            UNITS_TEMPS = "F"
            ROTATION = 270
            DISPLAY = "humidity"
            DELAY = 300
            WAIT = 0
            PROGRESS = "on"
            SLEEP = 0
            LOGLVL = "debug"
            LOGFILE = "/tmp/enviro.log"
            UNKNOWN_KEY = 1
            "#,
        )
        .unwrap();

        assert_eq!(settings.credentials().unwrap(), Some(("jane", "aio_abc")));
        assert_eq!(settings.aio_upload, UploadMode::Force);
        assert_eq!(settings.feed_keys()[0], (Metric::Temperature, "enviro-temp".to_string()));
        assert_eq!(settings.units_temps, TempUnit::Fahrenheit);
        assert_eq!(settings.rotation, Rotation::R270);
        assert_eq!(settings.display, DisplayMode::Humidity);
        assert_eq!(settings.delay(), Duration::from_secs(300));
        // FREQ falls back to DELAY
        assert_eq!(settings.freq(), Duration::from_secs(300));
        // WAIT is clamped to one second
        assert_eq!(settings.wait(), Duration::from_secs(1));
        assert_eq!(settings.progress, Toggle(true));
        assert_eq!(settings.sleep(), None);
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.log_file, Some(PathBuf::from("/tmp/enviro.log")));
    }

    #[test]
    fn test_progress_accepts_variants() {
        for (raw, expected) in [("true", true), ("1", true), ("\"yes\"", true), ("\"OFF\"", false), ("0", false)] {
            let settings = Settings::parse(&format!("PROGRESS = {}", raw)).unwrap();
            assert_eq!(settings.progress, Toggle(expected), "PROGRESS = {}", raw);
        }
        assert!(Settings::parse("PROGRESS = \"maybe\"").is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::parse("AIO_UPLOAD = \"sometimes\"").is_err());
        assert!(Settings::parse("ROTATION = 45").is_err());
        assert!(Settings::parse("DISPLAY = \"fireworks\"").is_err());
        assert!(Settings::parse("UNITS_TEMPS = \"R\"").is_err());
    }

    #[test]
    fn test_credentials_required_unless_disabled() {
        let settings = Settings::parse("AIO_USERNAME = \"jane\"").unwrap();
        assert!(matches!(
            settings.credentials(),
            Err(ConfigError::MissingCredentials(UploadMode::Yes))
        ));

        let settings = Settings::parse("AIO_UPLOAD = \"no\"").unwrap();
        assert_eq!(settings.credentials().unwrap(), None);
    }

    #[test]
    fn test_freq_sets_later_intervals() {
        let settings = Settings::parse("DELAY = 30\nFREQ = 600").unwrap();
        assert_eq!(settings.delay(), Duration::from_secs(30));
        assert_eq!(settings.freq(), Duration::from_secs(600));
        assert_eq!(Settings::default().freq(), Duration::from_secs(59));
    }

    #[test]
    fn test_upload_limit_needs_uploads() {
        let settings = Settings::parse("AIO_UPLOAD = \"no\"").unwrap();
        assert!(matches!(
            settings.check_upload_limit(Some(1)),
            Err(ConfigError::UploadLimitWithoutUploads)
        ));
        assert!(settings.check_upload_limit(None).is_ok());

        let settings = Settings::parse("AIO_UPLOAD = \"force\"").unwrap();
        assert!(settings.check_upload_limit(Some(3)).is_ok());
    }

    #[test]
    fn test_overrides_win() {
        let settings = Settings::parse("DISPLAY = \"all\"\nLOGLVL = \"error\"").unwrap();
        let settings = settings.apply(Overrides {
            display: Some(DisplayMode::Pressure),
            progress: true,
            debug: true,
            log_file: Some(PathBuf::from("run.log")),
        });
        assert_eq!(settings.display, DisplayMode::Pressure);
        assert_eq!(settings.progress, Toggle(true));
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.log_file, Some(PathBuf::from("run.log")));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let missing = Path::new("/nonexistent/enviromon/settings.toml");
        assert_eq!(Settings::locate(Some(missing)), Some(missing.to_path_buf()));
        let err = Settings::load(Some(missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert_eq!(Settings::load(None).unwrap().delay, 59);
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join(format!("enviromon-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(FILE_NAME);
        fs::write(&path, "DELAY = 10\nAIO_UPLOAD = \"no\"\n").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.delay, 10);
        assert_eq!(settings.aio_upload, UploadMode::No);

        fs::write(&path, "DELAY = \"soon\"\n").unwrap();
        assert!(matches!(Settings::from_file(&path), Err(ConfigError::Parse { .. })));

        fs::remove_dir_all(&dir).unwrap();
    }
}

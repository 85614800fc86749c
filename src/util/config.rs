use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use crate::render::raster::FrontFace;
use crate::render::resolve::AlphaSource;

const CONFIG_PATH: &str = "fanfill.cfg";
const CONFIG_ENV: &str = "FANFILL_CONFIG";

pub const DEFAULT_GAMMA: f32 = 2.2;
pub const DEFAULT_SUMMARY_FRAMES: u32 = 1800;

/// How instances are written into the counter buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccumulationMode {
    /// One writer, plain adds.
    #[default]
    Serial,
    /// Instances spread over the thread pool, compare-and-swap adds.
    Atomic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    pub gamma: f32,
    pub subpixel_aa: bool,
    pub front_face: FrontFace,
    pub alpha_source: AlphaSource,
    pub accumulation: AccumulationMode,
    /// Frames between draw summaries; 0 disables them.
    pub summary_frames: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            subpixel_aa: false,
            front_face: FrontFace::Cw,
            alpha_source: AlphaSource::Coverage,
            accumulation: AccumulationMode::Serial,
            summary_frames: DEFAULT_SUMMARY_FRAMES,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    InvalidValue { line: usize, key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {e}"),
            ConfigError::InvalidValue { line, key, value } => {
                write!(f, "line {line}: invalid value {value:?} for {key}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

static CONFIG: OnceLock<RenderConfig> = OnceLock::new();

/// Process-wide config, read once from `$FANFILL_CONFIG` or `fanfill.cfg`.
///
/// A missing file gives the defaults silently; an unreadable or malformed one is logged and
/// also gives the defaults.
pub fn render_config() -> &'static RenderConfig {
    CONFIG.get_or_init(read_config)
}

fn read_config() -> RenderConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| CONFIG_PATH.to_string());
    match load(&path) {
        Ok(cfg) => {
            log::info!("config loaded from {path}");
            cfg
        }
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            RenderConfig::default()
        }
        Err(e) => {
            log::warn!("config {path}: {e}; using defaults");
            RenderConfig::default()
        }
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<RenderConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

/// Parse `key = value` lines. `#` starts a comment line; unknown keys are ignored.
pub fn parse(text: &str) -> Result<RenderConfig, ConfigError> {
    let mut cfg = RenderConfig::default();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        let invalid = || ConfigError::InvalidValue {
            line: idx + 1,
            key: key.to_string(),
            value: value.to_string(),
        };

        if key.eq_ignore_ascii_case("gamma") {
            cfg.gamma = value
                .parse::<f32>()
                .ok()
                .filter(|g| g.is_finite() && *g > 0.0)
                .ok_or_else(invalid)?;
        } else if key.eq_ignore_ascii_case("subpixel_aa") {
            cfg.subpixel_aa = parse_bool(value).ok_or_else(invalid)?;
        } else if key.eq_ignore_ascii_case("front_face") {
            cfg.front_face = match value.to_ascii_lowercase().as_str() {
                "cw" => FrontFace::Cw,
                "ccw" => FrontFace::Ccw,
                _ => return Err(invalid()),
            };
        } else if key.eq_ignore_ascii_case("alpha_source") {
            cfg.alpha_source = match value.to_ascii_lowercase().as_str() {
                "coverage" => AlphaSource::Coverage,
                "reserved" => AlphaSource::Reserved,
                _ => return Err(invalid()),
            };
        } else if key.eq_ignore_ascii_case("accumulation") {
            cfg.accumulation = match value.to_ascii_lowercase().as_str() {
                "serial" => AccumulationMode::Serial,
                "atomic" => AccumulationMode::Atomic,
                _ => return Err(invalid()),
            };
        } else if key.eq_ignore_ascii_case("summary_frames") {
            cfg.summary_frames = value.parse().map_err(|_| invalid())?;
        } else {
            log::warn!("config line {}: unknown key {key:?} ignored", idx + 1);
        }
    }

    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "on" | "ON" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "off" | "OFF" | "no" | "NO" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_gives_defaults() {
        assert_eq!(parse("").unwrap(), RenderConfig::default());
        assert_eq!(parse("# only a comment\n\n").unwrap(), RenderConfig::default());
    }

    #[test]
    fn all_keys() {
        let text = "\
            gamma = 1.8\n\
            SUBPIXEL_AA=on\n\
            front_face = ccw\n\
            alpha_source = Reserved\n\
            accumulation = atomic\n\
            summary_frames = 0\n\
            unknown_key = whatever\n";
        let cfg = parse(text).unwrap();
        assert_eq!(
            cfg,
            RenderConfig {
                gamma: 1.8,
                subpixel_aa: true,
                front_face: FrontFace::Ccw,
                alpha_source: AlphaSource::Reserved,
                accumulation: AccumulationMode::Atomic,
                summary_frames: 0,
            }
        );
    }

    #[test]
    fn bad_values_report_line() {
        let err = parse("subpixel_aa = 1\ngamma = -2\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { line, key, value } => {
                assert_eq!(line, 2);
                assert_eq!(key, "gamma");
                assert_eq!(value, "-2");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(parse("subpixel_aa = maybe").is_err());
        assert!(parse("front_face = up").is_err());
        assert!(parse("gamma = NaN").is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load("/nonexistent/fanfill.cfg").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

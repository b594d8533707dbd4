use rollcall_core::RecognitionConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 30;
pub const DEFAULT_MAX_CAPTURE_FAILURES: u32 = 150;
/// Match tolerance for the shipped ArcFace provider. Its embeddings are unit
/// vectors, so distance d corresponds to cosine similarity 1 - d²/2; 1.1 accepts
/// pairs above roughly 0.4.
pub const DEFAULT_ONNX_TOLERANCE: f32 = 1.1;
const DEFAULT_LABEL_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Recognition(#[from] rollcall_core::ConfigError),
}

/// Daemon configuration.
///
/// Defaults, then the optional TOML file named by `ROLLCALL_CONFIG`, then
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    pub camera_width: u32,
    pub camera_height: u32,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// One image per enrolled identity.
    pub enrollment_dir: PathBuf,
    /// Append-only attendance log.
    pub attendance_log: PathBuf,
    pub recognition: RecognitionConfig,
    /// Pause between the end of one tick and the start of the next.
    pub tick_interval_ms: u64,
    /// TrueType font for overlay labels; labels are drawn without text if unset or missing.
    pub label_font: Option<PathBuf>,
    /// Consecutive capture failures before the camera is declared unavailable.
    pub max_capture_failures: u32,
}

/// Keys accepted in the TOML file; all optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    camera_device: Option<String>,
    camera_width: Option<u32>,
    camera_height: Option<u32>,
    model_dir: Option<PathBuf>,
    enrollment_dir: Option<PathBuf>,
    attendance_log: Option<PathBuf>,
    tolerance: Option<f32>,
    detection_cadence: Option<u32>,
    downsample_factor: Option<f32>,
    tick_interval_ms: Option<u64>,
    label_font: Option<PathBuf>,
    max_capture_failures: Option<u32>,
}

impl Config {
    /// Defaults rooted at `data_dir` (normally `$XDG_DATA_HOME/rollcall`).
    pub fn defaults(data_dir: &Path) -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            camera_width: 640,
            camera_height: 480,
            model_dir: data_dir.join("models"),
            enrollment_dir: data_dir.join("known_faces"),
            attendance_log: data_dir.join("attendance_log.txt"),
            recognition: RecognitionConfig {
                tolerance: DEFAULT_ONNX_TOLERANCE,
                ..RecognitionConfig::default()
            },
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            label_font: Some(PathBuf::from(DEFAULT_LABEL_FONT)),
            max_capture_failures: DEFAULT_MAX_CAPTURE_FAILURES,
        }
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` for environment variables.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let mut config = Self::defaults(&data_dir);

        if let Some(path) = lookup("ROLLCALL_CONFIG") {
            let file = read_file(Path::new(&path))?;
            config.apply_file(file);
            tracing::debug!(path = %path, "applied config file");
        }

        config.apply_env(&lookup);
        config.recognition.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = file.$field { self.$field = v; })*
            };
        }
        set!(
            camera_device,
            camera_width,
            camera_height,
            model_dir,
            enrollment_dir,
            attendance_log,
            tick_interval_ms,
            max_capture_failures
        );
        if let Some(v) = file.tolerance {
            self.recognition.tolerance = v;
        }
        if let Some(v) = file.detection_cadence {
            self.recognition.detection_cadence = v;
        }
        if let Some(v) = file.downsample_factor {
            self.recognition.downsample_factor = v;
        }
        if let Some(v) = file.label_font {
            self.label_font = Some(v);
        }
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ROLLCALL_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        env_parse(lookup, "ROLLCALL_CAMERA_WIDTH", &mut self.camera_width);
        env_parse(lookup, "ROLLCALL_CAMERA_HEIGHT", &mut self.camera_height);
        if let Some(v) = lookup("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_ENROLLMENT_DIR") {
            self.enrollment_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_ATTENDANCE_LOG") {
            self.attendance_log = PathBuf::from(v);
        }
        env_parse(lookup, "ROLLCALL_TOLERANCE", &mut self.recognition.tolerance);
        env_parse(lookup, "ROLLCALL_DETECTION_CADENCE", &mut self.recognition.detection_cadence);
        env_parse(lookup, "ROLLCALL_DOWNSAMPLE_FACTOR", &mut self.recognition.downsample_factor);
        env_parse(lookup, "ROLLCALL_TICK_INTERVAL_MS", &mut self.tick_interval_ms);
        env_parse(lookup, "ROLLCALL_MAX_CAPTURE_FAILURES", &mut self.max_capture_failures);
        // An empty value disables label text.
        if let Some(v) = lookup("ROLLCALL_LABEL_FONT") {
            self.label_font = (!v.is_empty()).then(|| PathBuf::from(v));
        }
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn env_parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *target = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparsable environment value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_under_xdg_data_home() {
        let config = Config::load(env(&[("XDG_DATA_HOME", "/data")])).unwrap();
        assert_eq!(config.enrollment_dir, PathBuf::from("/data/rollcall/known_faces"));
        assert_eq!(config.attendance_log, PathBuf::from("/data/rollcall/attendance_log.txt"));
        assert_eq!(config.recognition.tolerance, DEFAULT_ONNX_TOLERANCE);
        assert_ne!(config.recognition.tolerance, RecognitionConfig::default().tolerance);
        assert_eq!(config.recognition.detection_cadence, 45);
        assert_eq!(config.recognition.downsample_factor, 0.2);
        assert!(config.recognition.validate().is_ok());
        assert_eq!(config.tick_interval_ms, 30);
        assert_eq!(config.max_capture_failures, 150);
    }

    #[test]
    fn test_home_fallback() {
        let config = Config::load(env(&[("HOME", "/home/ana")])).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/home/ana/.local/share/rollcall/models"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::load(env(&[
            ("HOME", "/h"),
            ("ROLLCALL_CAMERA_DEVICE", "/dev/video4"),
            ("ROLLCALL_TOLERANCE", "0.45"),
            ("ROLLCALL_DETECTION_CADENCE", "10"),
            ("ROLLCALL_LABEL_FONT", ""),
            ("ROLLCALL_TICK_INTERVAL_MS", "not-a-number"),
        ]))
        .unwrap();
        assert_eq!(config.camera_device, "/dev/video4");
        assert_eq!(config.recognition.tolerance, 0.45);
        assert_eq!(config.recognition.detection_cadence, 10);
        assert_eq!(config.label_font, None);
        assert_eq!(config.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(
            &path,
            "camera_device = \"/dev/video9\"\ntolerance = 0.5\ndownsample_factor = 0.5\nenrollment_dir = \"/srv/faces\"\n",
        )
        .unwrap();
        let path_str = path.to_str().unwrap();

        let config = Config::load(env(&[
            ("HOME", "/h"),
            ("ROLLCALL_CONFIG", path_str),
            ("ROLLCALL_TOLERANCE", "0.7"),
        ]))
        .unwrap();
        assert_eq!(config.camera_device, "/dev/video9");
        assert_eq!(config.enrollment_dir, PathBuf::from("/srv/faces"));
        assert_eq!(config.recognition.downsample_factor, 0.5);
        assert_eq!(config.recognition.tolerance, 0.7);
    }

    #[test]
    fn test_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "no_such_key = 1\n").unwrap();
        let path_str = path.to_str().unwrap();
        let err = Config::load(env(&[("HOME", "/h"), ("ROLLCALL_CONFIG", path_str)])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = Config::load(env(&[("HOME", "/h"), ("ROLLCALL_CONFIG", "/nonexistent/rollcall.toml")])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_recognition_config() {
        let err = Config::load(env(&[("HOME", "/h"), ("ROLLCALL_DOWNSAMPLE_FACTOR", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Recognition(_)));
    }
}

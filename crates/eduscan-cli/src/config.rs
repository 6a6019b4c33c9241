use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output colour scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme {other:?}")),
        }
    }
}

/// Runtime configuration: defaults, then `eduscan.toml`, then `EDUSCAN_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// File the configuration was read from (and where theme changes go).
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Per-student face photos and voice samples.
    pub media_dir: PathBuf,
    /// JSON mirror of the attendance table.
    pub attendance_log: PathBuf,
    pub active_unit_path: PathBuf,
    pub export_dir: PathBuf,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Euclidean distance below which a face matches.
    pub tolerance: f32,
    /// Cosine similarity above which a voice sample matches.
    pub voice_threshold: f32,
    /// Run recognition on every n-th frame.
    pub process_every: u32,
    pub frame_interval_ms: u64,
    pub capture_width: u32,
    pub capture_height: u32,
    /// Frames discarded after opening the camera (auto-exposure settling).
    pub warmup_frames: usize,
    pub speech_enabled: bool,
    pub speech_command: String,
    pub voice_record_secs: u64,
    /// Offer a voice check when a face is not recognised.
    pub voice_fallback: bool,
    pub theme: Theme,
}

/// Optional settings from one layer (file or environment).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub media_dir: Option<PathBuf>,
    pub attendance_log: Option<PathBuf>,
    pub active_unit_path: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub camera_device: Option<String>,
    pub model_dir: Option<PathBuf>,
    pub tolerance: Option<f32>,
    pub voice_threshold: Option<f32>,
    pub process_every: Option<u32>,
    pub frame_interval_ms: Option<u64>,
    pub capture_width: Option<u32>,
    pub capture_height: Option<u32>,
    pub warmup_frames: Option<usize>,
    pub speech_enabled: Option<bool>,
    pub speech_command: Option<String>,
    pub voice_record_secs: Option<u64>,
    pub voice_fallback: Option<bool>,
    pub theme: Option<Theme>,
}

impl Overrides {
    /// Read `EDUSCAN_*` variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| lookup(key).map(PathBuf::from);
        Self {
            data_dir: path("EDUSCAN_DATA_DIR"),
            db_path: path("EDUSCAN_DB_PATH"),
            media_dir: path("EDUSCAN_MEDIA_DIR"),
            attendance_log: path("EDUSCAN_ATTENDANCE_LOG"),
            active_unit_path: path("EDUSCAN_ACTIVE_UNIT"),
            export_dir: path("EDUSCAN_EXPORT_DIR"),
            camera_device: lookup("EDUSCAN_CAMERA_DEVICE"),
            model_dir: path("EDUSCAN_MODEL_DIR"),
            tolerance: parsed(&lookup, "EDUSCAN_TOLERANCE"),
            voice_threshold: parsed(&lookup, "EDUSCAN_VOICE_THRESHOLD"),
            process_every: parsed(&lookup, "EDUSCAN_PROCESS_EVERY"),
            frame_interval_ms: parsed(&lookup, "EDUSCAN_FRAME_INTERVAL_MS"),
            capture_width: parsed(&lookup, "EDUSCAN_CAPTURE_WIDTH"),
            capture_height: parsed(&lookup, "EDUSCAN_CAPTURE_HEIGHT"),
            warmup_frames: parsed(&lookup, "EDUSCAN_WARMUP_FRAMES"),
            speech_enabled: lookup("EDUSCAN_SPEECH").map(|v| flag(&v)),
            speech_command: lookup("EDUSCAN_SPEECH_COMMAND"),
            voice_record_secs: parsed(&lookup, "EDUSCAN_VOICE_RECORD_SECS"),
            voice_fallback: lookup("EDUSCAN_VOICE_FALLBACK").map(|v| flag(&v)),
            theme: parsed(&lookup, "EDUSCAN_THEME"),
        }
    }

    /// Layer `self` over `lower`; set fields in `self` win.
    pub fn over(self, lower: Overrides) -> Overrides {
        Overrides {
            data_dir: self.data_dir.or(lower.data_dir),
            db_path: self.db_path.or(lower.db_path),
            media_dir: self.media_dir.or(lower.media_dir),
            attendance_log: self.attendance_log.or(lower.attendance_log),
            active_unit_path: self.active_unit_path.or(lower.active_unit_path),
            export_dir: self.export_dir.or(lower.export_dir),
            camera_device: self.camera_device.or(lower.camera_device),
            model_dir: self.model_dir.or(lower.model_dir),
            tolerance: self.tolerance.or(lower.tolerance),
            voice_threshold: self.voice_threshold.or(lower.voice_threshold),
            process_every: self.process_every.or(lower.process_every),
            frame_interval_ms: self.frame_interval_ms.or(lower.frame_interval_ms),
            capture_width: self.capture_width.or(lower.capture_width),
            capture_height: self.capture_height.or(lower.capture_height),
            warmup_frames: self.warmup_frames.or(lower.warmup_frames),
            speech_enabled: self.speech_enabled.or(lower.speech_enabled),
            speech_command: self.speech_command.or(lower.speech_command),
            voice_record_secs: self.voice_record_secs.or(lower.voice_record_secs),
            voice_fallback: self.voice_fallback.or(lower.voice_fallback),
            theme: self.theme.or(lower.theme),
        }
    }
}

impl Config {
    /// Load from the config file (if any) and the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let env = Overrides::from_lookup(|key| std::env::var(key).ok());
        let path = config_path(|key| std::env::var(key).ok());
        let file = read_file(&path)?;
        Ok(Self::resolve(env.over(file), path))
    }

    /// Fill unset fields with defaults. Paths not given explicitly live
    /// under the data directory.
    pub fn resolve(o: Overrides, config_path: PathBuf) -> Self {
        let data_dir = o.data_dir.unwrap_or_else(default_data_dir);

        let mut process_every = o.process_every.unwrap_or(5);
        if process_every == 0 {
            tracing::warn!("process_every must be at least 1; using 1");
            process_every = 1;
        }
        let mut tolerance = o.tolerance.unwrap_or(1.10);
        if tolerance.is_nan() || tolerance <= 0.0 {
            tracing::warn!(tolerance, "tolerance must be positive; using 1.10");
            tolerance = 1.10;
        }
        let voice_threshold = o.voice_threshold.unwrap_or(0.75).clamp(-1.0, 1.0);

        Self {
            config_path,
            db_path: o.db_path.unwrap_or_else(|| data_dir.join("students.db")),
            media_dir: o.media_dir.unwrap_or_else(|| data_dir.join("students")),
            attendance_log: o
                .attendance_log
                .unwrap_or_else(|| data_dir.join("attendance_log.json")),
            active_unit_path: o
                .active_unit_path
                .unwrap_or_else(|| data_dir.join("active_unit.json")),
            export_dir: o.export_dir.unwrap_or_else(|| PathBuf::from(".")),
            camera_device: o.camera_device.unwrap_or_else(|| "/dev/video0".to_string()),
            model_dir: o.model_dir.unwrap_or_else(|| data_dir.join("models")),
            tolerance,
            voice_threshold,
            process_every,
            frame_interval_ms: o.frame_interval_ms.unwrap_or(50).max(1),
            capture_width: o.capture_width.unwrap_or(320),
            capture_height: o.capture_height.unwrap_or(240),
            warmup_frames: o.warmup_frames.unwrap_or(4),
            speech_enabled: o.speech_enabled.unwrap_or(true),
            speech_command: o.speech_command.unwrap_or_else(|| "espeak-ng".to_string()),
            voice_record_secs: o.voice_record_secs.unwrap_or(3).max(1),
            voice_fallback: o.voice_fallback.unwrap_or(false),
            theme: o.theme.unwrap_or_default(),
            data_dir,
        }
    }

    /// Write `theme` into the config file, keeping every other key.
    pub fn save_theme(&mut self, theme: Theme) -> anyhow::Result<()> {
        let mut table = match std::fs::read_to_string(&self.config_path) {
            Ok(text) => text.parse::<toml::Table>()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(e.into()),
        };
        let value = toml::Value::String(theme.as_str().into());
        table.insert("theme".into(), value);

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml::to_string_pretty(&table)?)?;
        self.theme = theme;
        tracing::info!(theme = theme.as_str(), path = %self.config_path.display(), "theme saved");
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("eduscan")
}

/// `$EDUSCAN_CONFIG`, else `eduscan.toml` in the data directory.
fn config_path(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = lookup("EDUSCAN_CONFIG") {
        return PathBuf::from(path);
    }
    lookup("EDUSCAN_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(default_data_dir)
        .join("eduscan.toml")
}

fn read_file(path: &Path) -> anyhow::Result<Overrides> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let overrides = toml::from_str(&text).map_err(|e| {
                anyhow::anyhow!("invalid config file {}: {e}", path.display())
            })?;
            tracing::debug!(path = %path.display(), "config file loaded");
            Ok(overrides)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Overrides::default()),
        Err(e) => Err(e.into()),
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}

fn flag(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    !matches!(value.as_str(), "0" | "false" | "no" | "off")
}

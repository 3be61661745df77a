//! config.rs – настройки библиотеки (defaults + переменные окружения)

pub const ENV_DEFAULT_SHEET_NAME: &str = "EXCELLIB_DEFAULT_SHEET_NAME";
pub const ENV_COMPRESSION_LEVEL: &str = "EXCELLIB_COMPRESSION_LEVEL";
pub const ENV_MAX_PART_BYTES: &str = "EXCELLIB_MAX_PART_BYTES";

pub const DEFAULT_SHEET_NAME: &str = "Sheet";
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 1;
/// Upper bound for a single decompressed zip part (256 MiB).
pub const DEFAULT_MAX_PART_BYTES: u64 = 256 * 1024 * 1024;

/// Options shared by every document the library creates, opens or saves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Title of the sheet a freshly created workbook starts with
    pub default_sheet_name: String,
    /// Deflate level used on save (0..=9)
    pub compression_level: i64,
    /// Parts larger than this are refused when reading
    pub max_part_bytes: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            default_sheet_name: DEFAULT_SHEET_NAME.to_owned(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
        }
    }
}

impl LibraryConfig {
    /// Defaults overridden by `EXCELLIB_*` environment variables.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(name) = std::env::var(ENV_DEFAULT_SHEET_NAME) {
            if !name.trim().is_empty() {
                cfg.default_sheet_name = name;
            }
        }
        if let Some(level) = std::env::var(ENV_COMPRESSION_LEVEL)
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            cfg.compression_level = level.clamp(0, 9);
        }
        if let Some(max) = std::env::var(ENV_MAX_PART_BYTES)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            cfg.max_part_bytes = max;
        }
        cfg
    }

    pub fn with_default_sheet_name<S: Into<String>>(mut self, name: S) -> Self {
        self.default_sheet_name = name.into();
        self
    }

    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = level.clamp(0, 9);
        self
    }

    pub fn with_max_part_bytes(mut self, max: u64) -> Self {
        self.max_part_bytes = max;
        self
    }
}

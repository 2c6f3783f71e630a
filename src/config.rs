use std::path::{Path, PathBuf};

use image::Rgba;

use crate::components::colors::{parse_hex, rgba_to_hex};
use crate::components::history::DEFAULT_UNDO_LEVELS;
use crate::error::{CanvasError, Result};
use crate::render::magnifier::ViewConfig;

const CONFIG_FILE: &str = "rasterpad.cfg";

// ============================================================================
// ENGINE CONFIG: key=value settings file
// ============================================================================

/// Engine settings. Everything here is fixed at construction of a
/// `CanvasManager`; the last two fields are the capability flags.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub undo_levels: usize,
    /// Display-pixel area above which a magnified redraw is tiled.
    pub large_area_threshold: u64,
    pub tile_size: u32,
    pub redraw_debounce_ms: u64,
    pub default_tolerance: u8,
    pub default_color: Rgba<u8>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// The host draws its own cursor instead of a software one.
    pub native_cursor: bool,
    pub smooth_downscale: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let view = ViewConfig::default();
        Self {
            undo_levels: DEFAULT_UNDO_LEVELS,
            large_area_threshold: view.large_area_threshold,
            tile_size: view.tile_size,
            redraw_debounce_ms: view.debounce_ms,
            default_tolerance: 32,
            default_color: Rgba([0, 0, 0, 255]),
            viewport_width: 800,
            viewport_height: 600,
            native_cursor: true,
            smooth_downscale: view.smooth_downscale,
        }
    }
}

/// Path to the config file.
/// On Linux:   ~/.config/rasterpad/rasterpad.cfg  (XDG_CONFIG_HOME respected)
/// On Windows: %APPDATA%\RasterPad\rasterpad.cfg
/// On macOS:   ~/Library/Application Support/RasterPad/rasterpad.cfg
/// Fallback:   same directory as the executable.
pub fn config_path() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                PathBuf::from(home).join(".config")
            })
            .join("rasterpad");
        return Some(config_dir.join(CONFIG_FILE));
    }
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
        return Some(PathBuf::from(appdata).join("RasterPad").join(CONFIG_FILE));
    }
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
        return Some(
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("RasterPad")
                .join(CONFIG_FILE),
        );
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join(CONFIG_FILE)))
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, val: &str, fallback: T) -> T {
    match val.parse() {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!("config: bad value '{}' for {}, using default", val, key);
            fallback
        }
    }
}

impl EngineConfig {
    /// Parse `key=value` lines. Unknown keys are ignored and malformed values
    /// keep their defaults.
    pub fn parse(content: &str) -> Self {
        let d = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "undo_levels" => s.undo_levels = parse_or(key, val, d.undo_levels),
                "large_area_threshold" => s.large_area_threshold = parse_or(key, val, d.large_area_threshold),
                "tile_size" => s.tile_size = parse_or(key, val, d.tile_size),
                "redraw_debounce_ms" => s.redraw_debounce_ms = parse_or(key, val, d.redraw_debounce_ms),
                "default_tolerance" => {
                    let t: i32 = parse_or(key, val, d.default_tolerance as i32);
                    s.default_tolerance = t.clamp(0, 255) as u8;
                }
                "default_color" => match parse_hex(val) {
                    Some(c) => s.default_color = c,
                    None => tracing::warn!("config: bad colour '{}', using default", val),
                },
                "viewport_width" => s.viewport_width = parse_or(key, val, d.viewport_width),
                "viewport_height" => s.viewport_height = parse_or(key, val, d.viewport_height),
                "native_cursor" => s.native_cursor = val == "true",
                "smooth_downscale" => s.smooth_downscale = val == "true",
                _ => tracing::debug!("config: ignoring unknown key '{}'", key),
            }
        }
        s
    }

    pub fn to_cfg_string(&self) -> String {
        format!(
            "undo_levels={}\n\
             large_area_threshold={}\n\
             tile_size={}\n\
             redraw_debounce_ms={}\n\
             default_tolerance={}\n\
             default_color={}\n\
             viewport_width={}\n\
             viewport_height={}\n\
             native_cursor={}\n\
             smooth_downscale={}\n",
            self.undo_levels,
            self.large_area_threshold,
            self.tile_size,
            self.redraw_debounce_ms,
            self.default_tolerance,
            rgba_to_hex(self.default_color),
            self.viewport_width,
            self.viewport_height,
            self.native_cursor,
            self.smooth_downscale,
        )
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_cfg_string())?;
        Ok(())
    }

    /// Load from the per-user config path (defaults if missing or unreadable).
    pub fn load() -> Self {
        let Some(path) = config_path() else { return Self::default() };
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("config: could not read {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path().ok_or_else(|| CanvasError::Configuration("no config directory".into()))?;
        self.save_to(&path)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(CanvasError::Configuration("tile_size must be at least 1".into()));
        }
        if self.undo_levels == 0 {
            return Err(CanvasError::Configuration("undo_levels must be at least 1".into()));
        }
        if self.large_area_threshold == 0 {
            return Err(CanvasError::Configuration("large_area_threshold must be at least 1".into()));
        }
        Ok(())
    }

    pub fn view_config(&self) -> ViewConfig {
        ViewConfig {
            large_area_threshold: self.large_area_threshold,
            tile_size: self.tile_size,
            debounce_ms: self.redraw_debounce_ms,
            smooth_downscale: self.smooth_downscale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_known_keys() {
        let cfg = EngineConfig::parse(
            "undo_levels=5\n\
             tile_size = 32\n\
             default_color=#ff0000\n\
             default_tolerance=900\n\
             smooth_downscale=false\n\
             mystery=1\n",
        );
        assert_eq!(cfg.undo_levels, 5);
        assert_eq!(cfg.tile_size, 32);
        assert_eq!(cfg.default_color, Rgba([255, 0, 0, 255]));
        assert_eq!(cfg.default_tolerance, 255);
        assert!(!cfg.smooth_downscale);
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = EngineConfig::parse("undo_levels=lots\ndefault_color=nope\nno equals sign");
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn text_round_trip() {
        let mut cfg = EngineConfig::default();
        cfg.viewport_width = 1234;
        cfg.native_cursor = false;
        cfg.default_color = Rgba([1, 2, 3, 4]);
        assert_eq!(EngineConfig::parse(&cfg.to_cfg_string()), cfg);
    }

    #[test]
    fn zero_tile_size_is_a_configuration_error() {
        let cfg = EngineConfig {
            tile_size: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(CanvasError::Configuration(_))));
        assert!(EngineConfig::default().validate().is_ok());
    }
}

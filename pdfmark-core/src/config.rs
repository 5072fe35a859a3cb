use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::tool::{Tool, DEFAULT_TOOLS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Drop the live selection once it has been turned into an annotation.
    pub clear_selection: bool,
    /// Merge per-node quads on the same line.
    pub smooth_selection: bool,
    pub save: SaveConfig,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub auto_save_ms: u64,
    pub explicit_save_ms: u64,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            auto_save_ms: 3000,
            explicit_save_ms: 100,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clear_selection: true,
            smooth_selection: true,
            save: SaveConfig::default(),
            tools: DEFAULT_TOOLS.clone(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("net", "pdfmark", "pdfmark").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults when `path` does not exist.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(?path, "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CoreError::Config {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut config: Config = toml::from_str(&raw).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.tools.is_empty() {
            config.tools = DEFAULT_TOOLS.clone();
        }
        Ok(config)
    }

    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools
            .iter()
            .find(|tool| tool.label().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::tool::ToolKind;

    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.save.auto_save_ms, 3000);
        assert_eq!(config.save.explicit_save_ms, 100);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r##"
clear_selection = false

[save]
auto_save_ms = 500

[[tools]]
name = "Pink"
type = "Highlight"
color = "#ff00ff"
opacity = 0.3

[[tools]]
type = "Underline"
color = [0, 0, 255]
underline_thickness = 3
"##,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(!config.clear_selection);
        assert!(config.smooth_selection);
        assert_eq!(config.save.auto_save_ms, 500);
        assert_eq!(config.save.explicit_save_ms, 100);
        assert_eq!(config.tools.len(), 2);
        let pink = config.tool("pink").unwrap();
        assert_eq!(pink.color, Rgb::new(255, 0, 255));
        assert_eq!(config.tools[1].kind, ToolKind::Underline);
        assert_eq!(config.tools[1].underline_thickness, Some(3));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "save = 12").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(CoreError::ConfigParse { .. })
        ));
    }
}

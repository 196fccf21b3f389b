use std::fs;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use directories::UserDirs;
use serde::{Deserialize, Serialize};

use crate::domain::VectorDriver;
use crate::error::ConvertError;
use crate::fs_util::to_utf8;
use crate::ledger::LEDGER_FILE_NAME;

pub const DEFAULT_CONFIG_FILE: &str = "kmz2shp.json";
pub const DEFAULT_WORKSPACE_DIR: &str = "temp";
const DEFAULT_INPUT_FOLDER: &str = "GIS KMZs";
const DEFAULT_OUTPUT_FOLDER: &str = "GIS SHPs";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub input_root: Option<String>,
    #[serde(default)]
    pub output_root: Option<String>,
    #[serde(default)]
    pub workspace_dir: Option<String>,
    #[serde(default)]
    pub ledger_file: Option<String>,
    #[serde(default)]
    pub driver: Option<VectorDriver>,
    #[serde(default)]
    pub layer_options: Vec<String>,
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input_root: Option<String>,
    pub output_root: Option<String>,
    pub driver: Option<VectorDriver>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub input_root: Utf8PathBuf,
    pub output_root: Utf8PathBuf,
    pub workspace_dir: String,
    pub ledger_file: String,
    pub driver: VectorDriver,
    pub layer_options: Vec<String>,
}

impl ResolvedConfig {
    pub fn new(input_root: impl Into<Utf8PathBuf>, output_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            workspace_dir: DEFAULT_WORKSPACE_DIR.to_string(),
            ledger_file: LEDGER_FILE_NAME.to_string(),
            driver: VectorDriver::default(),
            layer_options: Vec::new(),
        }
    }

    pub fn workspace_path(&self) -> Utf8PathBuf {
        self.input_root.join(&self.workspace_dir)
    }

    pub fn ledger_path(&self) -> Utf8PathBuf {
        self.output_root.join(&self.ledger_file)
    }

    pub fn report_dir(&self) -> &Utf8Path {
        &self.output_root
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>, overrides: Overrides) -> Result<ResolvedConfig, ConvertError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| ConvertError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| ConvertError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: Overrides,
    ) -> Result<ResolvedConfig, ConvertError> {
        let input_root = match overrides.input_root.or(config.input_root) {
            Some(value) => absolute(&value)?,
            None => desktop_folder(DEFAULT_INPUT_FOLDER)?,
        };
        let output_root = match overrides.output_root.or(config.output_root) {
            Some(value) => absolute(&value)?,
            None => desktop_folder(DEFAULT_OUTPUT_FOLDER)?,
        };

        let workspace_dir = config
            .workspace_dir
            .unwrap_or_else(|| DEFAULT_WORKSPACE_DIR.to_string());
        if workspace_dir.trim().is_empty() {
            return Err(ConvertError::ConfigParse(
                "workspace_dir must not be empty".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            input_root,
            output_root,
            workspace_dir,
            ledger_file: config
                .ledger_file
                .unwrap_or_else(|| LEDGER_FILE_NAME.to_string()),
            driver: overrides.driver.or(config.driver).unwrap_or_default(),
            layer_options: config.layer_options,
        })
    }
}

fn absolute(value: &str) -> Result<Utf8PathBuf, ConvertError> {
    let path = std::path::absolute(value)
        .map_err(|err| ConvertError::InvalidPath(format!("{value}: {err}")))?;
    to_utf8(path)
}

fn desktop_folder(name: &str) -> Result<Utf8PathBuf, ConvertError> {
    let dirs = UserDirs::new()
        .ok_or_else(|| ConvertError::InvalidPath("unable to resolve home directory".to_string()))?;
    let desktop = dirs
        .desktop_dir()
        .map(|dir| dir.to_path_buf())
        .unwrap_or_else(|| dirs.home_dir().join("Desktop"));
    to_utf8(desktop.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_file() {
        let config = Config {
            input_root: Some("/data/kmz".to_string()),
            output_root: Some("/data/shp".to_string()),
            ..Config::default()
        };
        let overrides = Overrides {
            input_root: Some("/other/kmz".to_string()),
            ..Overrides::default()
        };

        let resolved = ConfigLoader::resolve_config(config, overrides).unwrap();
        assert_eq!(resolved.input_root, Utf8PathBuf::from("/other/kmz"));
        assert_eq!(resolved.output_root, Utf8PathBuf::from("/data/shp"));
        assert_eq!(resolved.workspace_path(), Utf8PathBuf::from("/other/kmz/temp"));
        assert_eq!(
            resolved.ledger_path(),
            Utf8PathBuf::from("/data/shp/PreviouslyConvertedFiles.txt")
        );
        assert_eq!(resolved.driver, VectorDriver::EsriShapefile);
    }
}

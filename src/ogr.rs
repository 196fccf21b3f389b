use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{LazyLock, OnceLock};

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::VectorDriver;
use crate::error::ConvertError;

/// One layer of an opened vector source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerHandle {
    pub source: Utf8PathBuf,
    pub name: String,
    pub geometry: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceDataset {
    path: Utf8PathBuf,
    layers: Vec<LayerHandle>,
}

impl SourceDataset {
    pub fn new(path: impl Into<Utf8PathBuf>, layers: Vec<LayerHandle>) -> Self {
        Self {
            path: path.into(),
            layers,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn layers(&self) -> &[LayerHandle] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Result<&LayerHandle, ConvertError> {
        self.layers.get(index).ok_or_else(|| ConvertError::EmptyDataset {
            path: self.path.to_string(),
            index,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TargetDataset {
    pub path: Utf8PathBuf,
    pub driver: VectorDriver,
}

#[derive(Debug, Clone)]
pub struct CopiedLayer {
    pub name: String,
    pub files: Vec<Utf8PathBuf>,
}

pub trait VectorReader: Send + Sync {
    fn open(&self, path: &Utf8Path, read_only: bool) -> Result<SourceDataset, ConvertError>;
}

pub trait VectorWriter: Send + Sync {
    fn create_dataset(
        &self,
        dir: &Utf8Path,
        driver: VectorDriver,
    ) -> Result<TargetDataset, ConvertError>;
    fn copy_layer(
        &self,
        target: &TargetDataset,
        layer: &LayerHandle,
        name: &str,
        options: &[String],
    ) -> Result<CopiedLayer, ConvertError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub ogrinfo: Option<String>,
    pub ogr2ogr: Option<String>,
}

#[derive(Debug)]
struct OgrTools {
    ogrinfo: Option<PathBuf>,
    ogr2ogr: Option<PathBuf>,
}

static TOOLS: OnceLock<OgrTools> = OnceLock::new();

/// Locates the OGR tools once per process.
fn registered_tools() -> &'static OgrTools {
    TOOLS.get_or_init(|| {
        let tools = OgrTools {
            ogrinfo: find_in_path("ogrinfo"),
            ogr2ogr: find_in_path("ogr2ogr"),
        };
        info!(
            ogrinfo = ?tools.ogrinfo,
            ogr2ogr = ?tools.ogr2ogr,
            "registered OGR drivers"
        );
        tools
    })
}

/// Reads and writes vector data through the GDAL/OGR command line tools.
#[derive(Debug, Clone)]
pub struct OgrToolsClient {
    ogrinfo: PathBuf,
    ogr2ogr: PathBuf,
}

impl OgrToolsClient {
    pub fn new() -> Result<Self, ConvertError> {
        let tools = registered_tools();
        let ogrinfo = tools
            .ogrinfo
            .clone()
            .ok_or_else(|| ConvertError::MissingTool("ogrinfo (GDAL)".to_string()))?;
        let ogr2ogr = tools
            .ogr2ogr
            .clone()
            .ok_or_else(|| ConvertError::MissingTool("ogr2ogr (GDAL)".to_string()))?;
        Ok(Self { ogrinfo, ogr2ogr })
    }

    pub fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            ogrinfo: tool_version(&self.ogrinfo),
            ogr2ogr: tool_version(&self.ogr2ogr),
        }
    }

    fn run_cmd(&self, program: &Path, args: &[String]) -> Result<String, String> {
        debug!(program = %program.display(), ?args, "running OGR tool");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| err.to_string())?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Err(format!("command failed: {}", program.display()))
        } else {
            Err(stderr)
        }
    }
}

impl VectorReader for OgrToolsClient {
    fn open(&self, path: &Utf8Path, read_only: bool) -> Result<SourceDataset, ConvertError> {
        let mut args = Vec::new();
        if read_only {
            args.push("-ro".to_string());
        }
        args.push("-q".to_string());
        args.push(path.to_string());

        let stdout = self
            .run_cmd(&self.ogrinfo, &args)
            .map_err(|message| ConvertError::VectorRead(format!("{path}: {message}")))?;
        Ok(SourceDataset::new(path, parse_layer_listing(&stdout, path)))
    }
}

impl VectorWriter for OgrToolsClient {
    fn create_dataset(
        &self,
        dir: &Utf8Path,
        driver: VectorDriver,
    ) -> Result<TargetDataset, ConvertError> {
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| ConvertError::VectorWrite(format!("create {dir}: {err}")))?;
        Ok(TargetDataset {
            path: dir.to_path_buf(),
            driver,
        })
    }

    fn copy_layer(
        &self,
        target: &TargetDataset,
        layer: &LayerHandle,
        name: &str,
        options: &[String],
    ) -> Result<CopiedLayer, ConvertError> {
        let destination = layer_destination(target, name);
        let mut args = vec!["-f".to_string(), target.driver.ogr_name().to_string()];
        match target.driver {
            VectorDriver::EsriShapefile => args.push("-overwrite".to_string()),
            // The KML driver cannot update a file in place, so replace it.
            VectorDriver::Kml => {
                if destination.as_std_path().exists() {
                    fs::remove_file(destination.as_std_path()).map_err(|err| {
                        ConvertError::VectorWrite(format!("replace {destination}: {err}"))
                    })?;
                }
            }
        }
        args.extend([
            destination.to_string(),
            layer.source.to_string(),
            layer.name.clone(),
            "-nln".to_string(),
            name.to_string(),
        ]);
        for option in options {
            args.push("-lco".to_string());
            args.push(option.clone());
        }

        self.run_cmd(&self.ogr2ogr, &args)
            .map_err(|message| ConvertError::VectorWrite(format!("{destination}: {message}")))?;

        Ok(CopiedLayer {
            name: name.to_string(),
            files: written_files(target, name)?,
        })
    }
}

/// Shapefiles are written into the dataset directory; a KML dataset is a
/// single `<name>.kml` file inside it.
pub fn layer_destination(target: &TargetDataset, name: &str) -> Utf8PathBuf {
    match target.driver {
        VectorDriver::EsriShapefile => target.path.clone(),
        VectorDriver::Kml => target.path.join(format!("{name}.kml")),
    }
}

fn written_files(target: &TargetDataset, name: &str) -> Result<Vec<Utf8PathBuf>, ConvertError> {
    match target.driver {
        VectorDriver::EsriShapefile => shapefile_parts(&target.path, name),
        VectorDriver::Kml => {
            let file = layer_destination(target, name);
            if !file.as_std_path().is_file() {
                return Err(ConvertError::VectorWrite(format!("missing KML output {file}")));
            }
            Ok(vec![file])
        }
    }
}

const REQUIRED_PARTS: &[&str] = &["shp", "shx", "dbf"];

/// The geometry, index and attribute parts must exist; the projection part is
/// only expected.
fn shapefile_parts(dir: &Utf8Path, name: &str) -> Result<Vec<Utf8PathBuf>, ConvertError> {
    let mut files = Vec::new();
    for ext in REQUIRED_PARTS {
        let part = dir.join(format!("{name}.{ext}"));
        if !part.as_std_path().exists() {
            return Err(ConvertError::VectorWrite(format!("missing shapefile part {part}")));
        }
        files.push(part);
    }
    let prj = dir.join(format!("{name}.prj"));
    if prj.as_std_path().exists() {
        files.push(prj);
    } else {
        warn!(dataset = %dir, layer = name, "shapefile written without projection");
    }
    Ok(files)
}

static LAYER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+:\s+(.+?)(?:\s+\(([^()]*)\))?\s*$").expect("valid layer listing pattern")
});

/// Parses the `N: name (geometry)` lines printed by `ogrinfo -q`.
pub fn parse_layer_listing(stdout: &str, source: &Utf8Path) -> Vec<LayerHandle> {
    stdout
        .lines()
        .filter_map(|line| LAYER_LINE.captures(line))
        .map(|caps| LayerHandle {
            source: source.to_path_buf(),
            name: caps[1].to_string(),
            geometry: caps.get(2).map(|value| value.as_str().to_string()),
        })
        .collect()
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    find_in(&std::env::var_os("PATH")?, name)
}

/// First regular file named `name` (or `name.exe`) in a `PATH`-style list.
fn find_in(search: &OsStr, name: &str) -> Option<PathBuf> {
    let candidates = [format!("{name}.exe"), name.to_string()];
    std::env::split_paths(search)
        .flat_map(|dir| candidates.iter().map(move |file| dir.join(file)))
        .find(|candidate| candidate.is_file())
}

fn tool_version(program: &Path) -> Option<String> {
    let output = Command::new(program).arg("--version").output().ok()?;
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (output.status.success() && !version.is_empty()).then_some(version)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_ogrinfo_layer_listing() {
        let stdout = "INFO: Open of `doc.kml'\n      using driver `KML' successful.\n1: 20-006 Boundary (Polygon)\n2: Points\n3: Site (2) (3D Point)\n";
        let layers = parse_layer_listing(stdout, Utf8Path::new("/tmp/doc.kml"));
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].name, "20-006 Boundary");
        assert_eq!(layers[0].geometry.as_deref(), Some("Polygon"));
        assert_eq!(layers[1].name, "Points");
        assert_eq!(layers[1].geometry, None);
        assert_eq!(layers[2].name, "Site (2)");
        assert_eq!(layers[2].geometry.as_deref(), Some("3D Point"));
    }

    #[test]
    fn missing_layer_index_is_empty_dataset() {
        let source = SourceDataset::new("/tmp/doc.kml", Vec::new());
        assert_matches!(
            source.layer(0),
            Err(ConvertError::EmptyDataset { index: 0, .. })
        );
    }

    #[test]
    fn kml_output_is_a_file_inside_the_dataset_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let shapefile = TargetDataset {
            path: dir.clone(),
            driver: VectorDriver::EsriShapefile,
        };
        let kml = TargetDataset {
            path: dir.clone(),
            driver: VectorDriver::Kml,
        };
        assert_eq!(layer_destination(&shapefile, "20-006"), dir);
        assert_eq!(layer_destination(&kml, "20-006"), dir.join("20-006.kml"));

        assert_matches!(
            written_files(&kml, "20-006"),
            Err(ConvertError::VectorWrite(_))
        );
        fs::write(dir.join("20-006.kml"), b"<kml/>").unwrap();
        assert_eq!(
            written_files(&kml, "20-006").unwrap(),
            vec![dir.join("20-006.kml")]
        );
    }

    #[test]
    fn path_lookup_ignores_directories() {
        let shadowing = tempfile::tempdir().unwrap();
        let installed = tempfile::tempdir().unwrap();
        fs::create_dir(shadowing.path().join("ogrinfo")).unwrap();
        fs::write(installed.path().join("ogrinfo"), b"#!/bin/sh\n").unwrap();

        let search =
            std::env::join_paths([shadowing.path(), installed.path()]).unwrap();
        assert_eq!(
            find_in(&search, "ogrinfo"),
            Some(installed.path().join("ogrinfo"))
        );
        assert_eq!(find_in(&search, "ogr2ogr"), None);
    }

    #[test]
    fn shapefile_parts_require_geometry_files() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        for ext in ["shp", "shx", "dbf", "prj"] {
            fs::write(dir.join(format!("20-006.{ext}")), b"x").unwrap();
        }
        assert_eq!(shapefile_parts(&dir, "20-006").unwrap().len(), 4);
        assert_matches!(
            shapefile_parts(&dir, "other"),
            Err(ConvertError::VectorWrite(_))
        );
    }
}

use std::fmt;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

pub const INPUT_EXTENSION: &str = "kmz";
pub const PAYLOAD_EXTENSION: &str = "kml";

/// A discovered input archive. The identifier is the path exactly as it was
/// enumerated; no case or separator normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputArchive(Utf8PathBuf);

impl InputArchive {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Utf8Path {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn output_name(&self) -> Result<String, ConvertError> {
        let stem = self.0.file_stem().unwrap_or_default();
        let name = derive_output_name(stem);
        // Must name exactly one child of the output root.
        let mut components = Utf8Path::new(&name).components();
        match (components.next(), components.next()) {
            (Some(Utf8Component::Normal(_)), None) if !name.trim().is_empty() => Ok(name),
            _ => Err(ConvertError::InvalidOutputName(self.as_str().to_string())),
        }
    }
}

impl fmt::Display for InputArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `"20-006 GIS"` becomes `"20-006"`: both casings of the marker are removed,
/// then trailing whitespace is trimmed.
pub fn derive_output_name(stem: &str) -> String {
    stem.replace("GIS", "")
        .replace("gis", "")
        .trim_end()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Converted { output_dir: Utf8PathBuf },
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum VectorDriver {
    #[serde(rename = "KML")]
    #[value(name = "kml")]
    Kml,
    #[default]
    #[serde(rename = "ESRI Shapefile")]
    #[value(name = "shapefile")]
    EsriShapefile,
}

impl VectorDriver {
    pub fn ogr_name(self) -> &'static str {
        match self {
            VectorDriver::Kml => "KML",
            VectorDriver::EsriShapefile => "ESRI Shapefile",
        }
    }
}

impl fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ogr_name())
    }
}

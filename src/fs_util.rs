use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::domain::InputArchive;
use crate::error::ConvertError;

/// Recursively collects every file under `root` whose extension matches `ext`
/// (ASCII case-insensitive), ignoring the `exclude` subtree.
pub fn find_inputs(
    root: &Utf8Path,
    ext: &str,
    exclude: Option<&Utf8Path>,
) -> Result<Vec<InputArchive>, ConvertError> {
    let mut inputs = Vec::new();
    let mut stack = vec![root.as_std_path().to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).map_err(|err| {
            ConvertError::Filesystem(format!("read directory {}: {err}", dir.display()))
        })?;
        for entry in entries {
            let entry = entry.map_err(|err| ConvertError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if exclude.is_some_and(|skip| path == skip.as_std_path()) {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else if has_extension(&path, ext) {
                match Utf8PathBuf::from_path_buf(path) {
                    Ok(path) => inputs.push(InputArchive::new(path)),
                    Err(path) => warn!(path = %path.display(), "skipping non-utf8 input path"),
                }
            }
        }
    }
    inputs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(inputs)
}

/// Unpacks every entry of `zip_path` into `target_dir`, creating it when
/// needed and overwriting files that already exist.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), ConvertError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        ConvertError::Extraction(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive = ZipArchive::new(file).map_err(extraction)?;
    fs::create_dir_all(target_dir).map_err(extraction)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(extraction)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            ConvertError::Extraction(format!("unsafe entry path {:?}", entry.name()))
        })?;
        let destination = target_dir.join(relative);

        let dir = if entry.is_dir() {
            Some(destination.as_path())
        } else {
            destination.parent()
        };
        if let Some(dir) = dir {
            fs::create_dir_all(dir).map_err(extraction)?;
        }
        if entry.is_file() {
            let mut outfile = fs::File::create(&destination).map_err(extraction)?;
            io::copy(&mut entry, &mut outfile).map_err(extraction)?;
        }
    }
    Ok(())
}

/// Extracts `archive` into `dest` and returns the single top-level file with
/// extension `ext`. Zero or several candidates are an extraction failure.
pub fn extract_payload(
    archive: &Utf8Path,
    dest: &Utf8Path,
    ext: &str,
) -> Result<Utf8PathBuf, ConvertError> {
    extract_zip(archive.as_std_path(), dest.as_std_path())?;

    let entries = fs::read_dir(dest.as_std_path())
        .map_err(|err| ConvertError::Extraction(format!("scan {dest}: {err}")))?;
    let mut candidates = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| ConvertError::Extraction(err.to_string()))?
            .path();
        if path.is_file() && has_extension(&path, ext) {
            candidates.push(path);
        }
    }

    match candidates.len() {
        1 => {
            let payload = candidates.remove(0);
            debug!(archive = %archive, payload = %payload.display(), "extracted payload");
            Utf8PathBuf::from_path_buf(payload).map_err(|path| {
                ConvertError::Extraction(format!("non-utf8 payload path {}", path.display()))
            })
        }
        count => Err(ConvertError::Extraction(format!(
            "expected exactly one .{ext} file in {archive}, found {count}"
        ))),
    }
}

/// Replaces `path` with `lines`, one per line, via a temp file in the same
/// directory.
pub fn write_lines_atomic<I, S>(path: &Utf8Path, lines: I) -> io::Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(parent.as_std_path())?;
    let mut temp = tempfile::Builder::new()
        .prefix("kmz2shp")
        .tempfile_in(parent.as_std_path())?;
    {
        let mut writer = io::BufWriter::new(temp.as_file_mut());
        for line in lines {
            writer.write_all(line.as_ref().as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    temp.persist(path.as_std_path()).map_err(|err| err.error)?;
    Ok(())
}

fn extraction(err: impl fmt::Display) -> ConvertError {
    ConvertError::Extraction(err.to_string())
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .map(|value| value.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

pub(crate) fn to_utf8(path: PathBuf) -> Result<Utf8PathBuf, ConvertError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| ConvertError::InvalidPath(format!("non-utf8 path {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_ignores_case() {
        assert!(has_extension(Path::new("a/B.KMZ"), "kmz"));
        assert!(has_extension(Path::new("a/b.kmz"), "kmz"));
        assert!(!has_extension(Path::new("a/b.kml"), "kmz"));
        assert!(!has_extension(Path::new("a/kmz"), "kmz"));
    }
}

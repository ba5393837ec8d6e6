// File utilities: walk a directory tree, narrow the file list down, and
// bundle what is left into a zip or tar.gz archive (or just list it).
// Archive entries are stored under the file's own name, without directories.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

/// Every regular file below `dir`, recursively, in a stable order.
pub fn get_all_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Keep files with the given extension. A leading dot is ignored, so `py`
/// and `.py` are the same.
pub fn filter_by_extension(files: &[PathBuf], extension: &str) -> Vec<PathBuf> {
    let wanted = extension.trim_start_matches('.');
    files
        .iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == wanted))
        .cloned()
        .collect()
}

/// Keep files whose stem is strictly shorter than `max_length` characters.
pub fn filter_short_named_files(files: &[PathBuf], max_length: usize) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|path| stem_len(path) < max_length)
        .cloned()
        .collect()
}

fn stem_len(path: &Path) -> usize {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().chars().count())
        .unwrap_or(0)
}

/// Drop `target` from `files`. Paths are compared after resolving their
/// directory, so `./out.zip` and `out.zip` are the same file. `target` need
/// not exist yet.
pub fn exclude_path(files: &[PathBuf], target: &Path) -> Vec<PathBuf> {
    let Some(target) = resolve(target) else {
        return files.to_vec();
    };
    files
        .iter()
        .filter(|path| resolve(path).as_deref() != Some(target.as_path()))
        .cloned()
        .collect()
}

fn resolve(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::canonicalize(parent).ok().map(|dir| dir.join(name))
}

/// Write one path per line.
pub fn output_file_list(files: &[PathBuf], output: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(output)?);
    for file in files {
        writeln!(out, "{}", file.display())?;
    }
    out.flush()?;
    info!(path = %output.display(), count = files.len(), "file list written");
    Ok(())
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Entry names used by more than one of `files`, in first-seen order.
/// Extracting such an archive keeps only one file per name.
pub fn duplicate_entry_names(files: &[PathBuf]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for name in files.iter().map(|f| entry_name(f)) {
        if !seen.insert(name.clone()) && !duplicates.contains(&name) {
            duplicates.push(name);
        }
    }
    duplicates
}

fn warn_duplicates(files: &[PathBuf]) {
    for name in duplicate_entry_names(files) {
        warn!(entry = %name, "duplicate entry name, extraction will keep only one");
    }
}

/// Zip `files` into `output`.
pub fn generate_zip_archive(files: &[PathBuf], output: &Path) -> Result<()> {
    warn_duplicates(files);
    let mut zip = ZipWriter::new(File::create(output)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for file in files {
        let name = entry_name(file);
        debug!(file = %file.display(), entry = %name, "adding to zip");
        zip.start_file(name, options)?;
        io::copy(&mut File::open(file)?, &mut zip)?;
    }
    zip.finish()?;
    info!(path = %output.display(), count = files.len(), "zip archive written");
    Ok(())
}

/// Tar and gzip `files` into `output`.
pub fn generate_tar_gz_archive(files: &[PathBuf], output: &Path) -> Result<()> {
    warn_duplicates(files);
    let encoder = GzEncoder::new(File::create(output)?, Compression::default());
    let mut tar = tar::Builder::new(encoder);
    for file in files {
        let name = entry_name(file);
        debug!(file = %file.display(), entry = %name, "adding to tarball");
        tar.append_path_with_name(file, &name)?;
    }
    tar.into_inner()?.finish()?;
    info!(path = %output.display(), count = files.len(), "tar.gz archive written");
    Ok(())
}

/// Remove an archive left by an earlier run, if any.
pub fn remove_existing(output: &Path) -> Result<()> {
    match fs::remove_file(output) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

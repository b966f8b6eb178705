use std::{
    fs,
    fs::{DirBuilder, File},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use memmap2::{Mmap, MmapOptions};

/// Opens a memory mapped file.
pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Mmap> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open file '{}'", path.display()))?;
    let map = unsafe { MmapOptions::new().map(&file) }
        .with_context(|| format!("Failed to mmap file: '{}'", path.display()))?;
    Ok(map)
}

/// Creates `dir` and any missing parents.
pub fn create_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    DirBuilder::new()
        .recursive(true)
        .create(dir)
        .with_context(|| format!("Failed to create directory '{}'", dir.display()))
}

/// Writes `data` to `path`, creating parent directories first.
pub fn write_file<P: AsRef<Path>, D: AsRef<[u8]>>(path: P, data: D) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, data).with_context(|| format!("Failed to write '{}'", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

/// Writes `image` as a PNG, creating parent directories first.
pub fn write_png<P: AsRef<Path>>(path: P, image: &RgbaImage) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory '{}'", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Final path component, for naming derived outputs.
pub fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("Path '{}' has no file name", path.display()))
}

//! tar.zst packing and unpacking of cached directory trees

use crate::{Error, Result};
use std::fs;
use std::path::Path;

/// Compression level used for cache archives
const ZSTD_LEVEL: i32 = 3;

/// Size summary of a packed directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveStats {
    /// Regular files in the archive
    pub files: u64,
    /// Total uncompressed size of those files
    pub bytes: u64,
}

/// Count the regular files under `root` and their total size
#[must_use]
pub fn dir_stats(root: &Path) -> ArchiveStats {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .fold(ArchiveStats::default(), |acc, e| ArchiveStats {
            files: acc.files + 1,
            bytes: acc.bytes + e.metadata().map_or(0, |m| m.len()),
        })
}

/// Create a compressed tar archive of `src_root` at `dst_file`
pub fn pack_dir(src_root: &Path, dst_file: &Path) -> Result<ArchiveStats> {
    let file = fs::File::create(dst_file).map_err(|e| Error::io(e, dst_file, "create"))?;
    let enc = zstd::Encoder::new(file, ZSTD_LEVEL)
        .map_err(|e| Error::archive(dst_file, format!("zstd encoder error: {e}")))?;
    let mut builder = tar::Builder::new(enc);
    builder.follow_symlinks(false);

    builder
        .append_dir_all(".", src_root)
        .map_err(|e| Error::archive(dst_file, format!("tar append failed: {e}")))?;

    let enc = builder
        .into_inner()
        .map_err(|e| Error::archive(dst_file, format!("tar finalize failed: {e}")))?;
    enc.finish()
        .map_err(|e| Error::archive(dst_file, format!("zstd finish failed: {e}")))?;

    Ok(dir_stats(src_root))
}

/// Unpack an archive produced by [`pack_dir`] into `dest`, creating it if needed.
///
/// Existing files in `dest` that are also in the archive are overwritten;
/// others are left alone.
pub fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| Error::io(e, dest, "create_dir_all"))?;
    let file = fs::File::open(archive).map_err(|e| Error::io(e, archive, "open"))?;
    let dec = zstd::Decoder::new(file)
        .map_err(|e| Error::archive(archive, format!("zstd decoder error: {e}")))?;
    let mut tar = tar::Archive::new(dec);
    tar.set_overwrite(true);
    tar.unpack(dest)
        .map_err(|e| Error::archive(archive, format!("unpack failed: {e}")))?;
    Ok(())
}

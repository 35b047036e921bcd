//! Board archiving
//!
//! Compresses a staged board directory into one file. Entries are stored under
//! the directory's own name (`{board_id}/{file}`).

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid archive source: {0}")]
    InvalidSource(PathBuf),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Produced archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResult {
    pub path: PathBuf,
    pub size: u64,
    pub entries: usize,
}

/// Compresses a directory into a single file at `dest`
pub trait Archiver: Send + Sync {
    fn archive(&self, source_dir: &Path, dest: &Path) -> Result<ArchiveResult>;
}

/// Deflate-compressed zip archiver
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    excluded_extensions: Vec<String>,
}

impl ZipArchiver {
    /// `excluded_extensions` are matched case-insensitively, without the dot
    pub fn new(excluded_extensions: Vec<String>) -> Self {
        Self {
            excluded_extensions: excluded_extensions
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.excluded_extensions.iter().any(|x| *x == ext)
            })
    }

    fn write_entries(&self, source_dir: &Path, prefix: &str, file: File) -> Result<usize> {
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut files = Vec::new();
        collect_files(source_dir, &mut files)?;
        files.sort();

        let mut entries = 0;
        for path in files {
            if self.is_excluded(&path) {
                debug!(path = %path.display(), "Excluded from archive");
                continue;
            }
            let Ok(relative) = path.strip_prefix(source_dir) else {
                continue;
            };
            let name = format!(
                "{}/{}",
                prefix,
                relative.to_string_lossy().replace('\\', "/")
            );

            zip.start_file(name, options)?;
            let mut input = File::open(&path)?;
            io::copy(&mut input, &mut zip)?;
            entries += 1;
        }

        zip.finish()?;
        Ok(entries)
    }
}

impl Archiver for ZipArchiver {
    fn archive(&self, source_dir: &Path, dest: &Path) -> Result<ArchiveResult> {
        let prefix = source_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ArchiveError::InvalidSource(source_dir.to_path_buf()))?;

        // Build beside the destination, then move into place
        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        let written = File::create(&partial)
            .map_err(ArchiveError::from)
            .and_then(|file| self.write_entries(source_dir, &prefix, file));

        let entries = match written {
            Ok(entries) => entries,
            Err(e) => {
                let _ = std::fs::remove_file(&partial);
                return Err(e);
            }
        };

        std::fs::rename(&partial, dest)?;
        let size = std::fs::metadata(dest)?.len();

        info!(path = %dest.display(), size, entries, "Archive written");
        Ok(ArchiveResult {
            path: dest.to_path_buf(),
            size,
            entries,
        })
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), out)?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}

use anyhow::{Result, Context, anyhow};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

// Common container formats accepted by the annotation service
const VIDEO_EXTENSIONS: [&str; 14] = [
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v",
    "mpg", "mpeg", "ogv", "ts", "mts", "m2ts",
];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Output path derived from the video name
    // @params: input name, output_dir, suffix appended to the stem, extension
    pub fn generate_output_path<P: AsRef<Path>>(
        input_name: &str,
        output_dir: P,
        suffix: &str,
        extension: &str,
    ) -> PathBuf {
        let stem = Self::video_stem(input_name);

        let mut output_filename = stem;
        output_filename.push_str(suffix);
        output_filename.push('.');
        output_filename.push_str(extension);

        output_dir.as_ref().join(output_filename)
    }

    /// Output directory for `file` found under `input_root`, keeping its
    /// subdirectory relative to the input root beneath `output_root`
    pub fn mirrored_output_dir(input_root: &Path, file: &Path, output_root: &Path) -> PathBuf {
        file.parent()
            .and_then(|parent| parent.strip_prefix(input_root).ok())
            .map(|relative| output_root.join(relative))
            .unwrap_or_else(|| output_root.to_path_buf())
    }

    /// File stem of a local path or cloud URI (`gs://bucket/dir/clip.mp4` -> `clip`)
    pub fn video_stem(input_name: &str) -> String {
        let last = input_name
            .trim_end_matches('/')
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(input_name);

        Path::new(last)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "video".to_string())
    }

    /// Whether the input names an object in cloud storage rather than a local file
    pub fn is_cloud_uri(input: &str) -> bool {
        input.starts_with("gs://")
    }

    /// Find all video files under a directory, sorted by path
    pub fn find_video_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() && Self::detect_file_type(path) == FileType::Video {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file through a temporary file in the same directory,
    /// so readers never observe a partially written file
    pub fn write_atomically<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to file: {:?}", path))?;
        temp.flush()?;

        temp.persist(path)
            .map_err(|e| anyhow!("Failed to move temporary file to {:?}: {}", path, e.error))?;

        Ok(())
    }

    /// Hex SHA-256 of a file's content
    pub fn sha256_file<P: AsRef<Path>>(path: P) -> Result<String> {
        let path = path.as_ref();
        let mut file = fs::File::open(path)
            .with_context(|| format!("Failed to open file for hashing: {:?}", path))?;

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Classify a path by its extension
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> FileType {
        let Some(ext) = path.as_ref().extension() else {
            return FileType::Unknown;
        };
        let ext_str = ext.to_string_lossy().to_lowercase();

        if ext_str == "json" {
            return FileType::Annotations;
        }

        if VIDEO_EXTENSIONS.contains(&ext_str.as_str()) {
            return FileType::Video;
        }

        FileType::Unknown
    }
}

/// Enum representing different file types
#[derive(Debug, PartialEq, Eq)]
pub enum FileType {
    /// Video file the annotation service can read
    Video,
    /// Saved detections (JSON)
    Annotations,
    /// Unknown file type
    Unknown,
}

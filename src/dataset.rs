//! Dataset index: ordered frame names and timestamps
//!
//! **Why**: every pane of one dataset shares a single ordered name list; the
//! Loader only ever consumes `names[slot_to_global[slot]]`. Names and
//! timestamps are index-aligned 1:1 and validated together before anything
//! downstream is built.
//!
//! **Used by**: FileFetcher (path resolution), Viewer (timestamp lookup)
//!
//! # Layout on disk
//!
//! ```text
//! root/
//!   datasets.txt          # one dataset name per line (optional)
//!   <dataset>/frames.txt      # newline-delimited image names, in order
//!   <dataset>/timestamps.txt  # newline-delimited, same length
//!   <dataset>/eighth/ ...     # resolution tiers, referenced by PaneConfig
//! ```
//!
//! When the list files are absent, `discover` scans a directory for image
//! files and orders them by trailing frame number.

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

static FRAME_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("frame number regex"));

const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];

/// Ordered frame-name list plus its index-aligned timestamp list.
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
    names: Vec<String>,
    timestamps: Vec<String>,
}

impl Dataset {
    /// Build from already-loaded lists. Fails on an empty name list or a
    /// length mismatch, before any state is kept.
    pub fn from_lists(
        root: PathBuf,
        names: Vec<String>,
        timestamps: Vec<String>,
    ) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Err(ConfigError::EmptyFrameList);
        }
        if names.len() != timestamps.len() {
            return Err(ConfigError::TimestampMismatch {
                names: names.len(),
                timestamps: timestamps.len(),
            });
        }
        Ok(Self { root, names, timestamps })
    }

    /// Read `frames.txt` + `timestamps.txt` from a dataset directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let names = read_lines(&dir.join("frames.txt"))?;
        let timestamps = read_lines(&dir.join("timestamps.txt"))?;
        let ds = Self::from_lists(dir.to_path_buf(), names, timestamps)?;
        info!("dataset {}: {} frames", dir.display(), ds.len());
        Ok(ds)
    }

    /// Fallback when no list files exist: scan `dir` for image files and
    /// order them by trailing frame number. Timestamps degrade to the file
    /// stems.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io(e.to_string()))?;
        let files = entries.flatten().map(|e| e.path()).collect();
        Self::index_files(dir.to_path_buf(), files)
    }

    /// Build from a glob pattern over image files, e.g.
    /// `plots/a/eighth/*.jpg`. The dataset root is the matched files'
    /// directory.
    pub fn from_glob(pattern: &str) -> Result<Self, ConfigError> {
        let paths = glob::glob(pattern).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let files: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
        let root = files
            .first()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::index_files(root, files)
    }

    fn index_files(root: PathBuf, files: Vec<PathBuf>) -> Result<Self, ConfigError> {
        let mut found: Vec<(usize, String)> = Vec::new();
        for path in files {
            if !path.is_file() {
                continue;
            }
            let ext = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_lowercase())
                .unwrap_or_default();
            if !IMAGE_EXTS.contains(&ext.as_str()) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            // Last digit group in the stem is the frame number.
            let num = FRAME_NUM
                .find_iter(stem)
                .last()
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(0);
            found.push((num, name.to_string()));
        }

        found.sort();
        let names: Vec<String> = found.into_iter().map(|(_, n)| n).collect();
        let timestamps = names
            .iter()
            .map(|n| n.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(n).to_string())
            .collect();

        let ds = Self::from_lists(root, names, timestamps)?;
        info!("discovered {} frames in {}", ds.len(), ds.root.display());
        Ok(ds)
    }

    /// Names of the datasets available under `root` (from `datasets.txt`).
    pub fn list_datasets(root: impl AsRef<Path>) -> Result<Vec<String>, ConfigError> {
        read_lines(&root.as_ref().join("datasets.txt"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, global_index: usize) -> Option<&str> {
        self.names.get(global_index).map(String::as_str)
    }

    pub fn timestamp(&self, global_index: usize) -> Option<&str> {
        self.timestamps.get(global_index).map(String::as_str)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tier directory against the dataset root, unless absolute.
    pub fn tier_dir(&self, tier_path: &Path) -> PathBuf {
        if tier_path.is_absolute() {
            tier_path.to_path_buf()
        } else {
            self.root.join(tier_path)
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

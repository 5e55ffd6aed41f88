//! Category folder scan and duplicate-extension resolution.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Supported extensions, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPriority(Vec<String>);

impl ExtensionPriority {
    /// Build from extensions with or without a leading dot, in any case.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        )
    }

    /// Position of `extension` in the priority list; lower wins.
    pub fn rank(&self, extension: &str) -> Option<usize> {
        let extension = extension.to_ascii_lowercase();
        self.0.iter().position(|ext| *ext == extension)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.rank(&ext).is_some())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for ExtensionPriority {
    fn default() -> Self {
        Self::new(["wav", "mp3", "ogg", "flac"])
    }
}

/// One logical recording: the canonical file for a basename plus the
/// lower-priority siblings it shadows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub basename: String,
    pub path: PathBuf,
    pub shadowed: Vec<PathBuf>,
}

impl CandidateFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.basename.clone())
    }
}

/// List the canonical files of one category folder, ordered by basename.
///
/// Only direct children with a supported extension are considered. Files that
/// share a basename are resolved to the highest-priority extension.
pub fn scan_category(dir: &Path, priority: &ExtensionPriority) -> std::io::Result<Vec<CandidateFile>> {
    let mut groups: BTreeMap<String, Vec<(usize, PathBuf)>> = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(rank) = extension_of(&path).and_then(|ext| priority.rank(&ext)) else {
            continue;
        };
        let Some(stem) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
            continue;
        };
        groups.entry(stem).or_default().push((rank, path));
    }
    Ok(groups
        .into_iter()
        .filter_map(|(basename, mut files)| {
            files.sort();
            let mut files = files.into_iter().map(|(_, path)| path);
            let path = files.next()?;
            Some(CandidateFile {
                basename,
                path,
                shadowed: files.collect(),
            })
        })
        .collect())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

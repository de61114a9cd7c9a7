//! Video files on disk, addressed by id

use std::path::{Path, PathBuf};

use reelcast_core::quality::{TARGET_RESOLUTIONS, TargetResolution};
use tracing::debug;

/// Extensions tried, in order, when resolving an id.
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mov"];

/// A directory of uploads. A video's id is its file stem; transcoded
/// variants sit next to it as `{id}_720p.mp4` and so on.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    /// Creates a library rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the library serves from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ids are plain file stems: no separators and no leading dot.
    pub fn is_valid_id(id: &str) -> bool {
        !id.is_empty()
            && !id.starts_with('.')
            && !id.contains("..")
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }

    /// Finds the file for `id`, or `None` if the id is invalid or missing.
    pub async fn resolve(&self, id: &str) -> Option<PathBuf> {
        if !Self::is_valid_id(id) {
            debug!("Rejected video id {:?}", id);
            return None;
        }

        for extension in VIDEO_EXTENSIONS {
            let path = self.root.join(format!("{id}.{extension}"));
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => return Some(path),
                _ => continue,
            }
        }
        None
    }

    /// Target resolutions for which a variant of `id` exists, highest first.
    pub async fn variants(&self, id: &str) -> Vec<&'static TargetResolution> {
        let mut found = Vec::new();
        for target in &TARGET_RESOLUTIONS {
            if self.resolve(&variant_id(id, target)).await.is_some() {
                found.push(target);
            }
        }
        found
    }
}

/// Id of the `target` variant of `id`.
pub fn variant_id(id: &str, target: &TargetResolution) -> String {
    format!("{id}{}", target.suffix)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_id_validation() {
        assert!(MediaLibrary::is_valid_id("intro"));
        assert!(MediaLibrary::is_valid_id("clip-01_720p"));
        assert!(!MediaLibrary::is_valid_id(""));
        assert!(!MediaLibrary::is_valid_id(".hidden"));
        assert!(!MediaLibrary::is_valid_id("../etc/passwd"));
        assert!(!MediaLibrary::is_valid_id("a/b"));
        assert!(!MediaLibrary::is_valid_id("a b"));
    }

    #[tokio::test]
    async fn test_resolve_tries_each_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("talk.webm"), b"webm").unwrap();
        let library = MediaLibrary::new(dir.path());

        assert_eq!(
            library.resolve("talk").await,
            Some(dir.path().join("talk.webm"))
        );
        assert_eq!(library.resolve("missing").await, None);
    }

    #[tokio::test]
    async fn test_variants_found_highest_first() {
        let dir = TempDir::new().unwrap();
        for name in ["talk.mp4", "talk_360p.mp4", "talk_720p.mp4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let library = MediaLibrary::new(dir.path());

        let labels: Vec<&str> = library
            .variants("talk")
            .await
            .iter()
            .map(|t| t.label)
            .collect();
        assert_eq!(labels, vec!["720p", "360p"]);
    }
}

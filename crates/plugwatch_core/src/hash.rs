//! Content hashing for dev dependency files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::DevDepError;
use crate::project_path::ProjectPath;

/// Digest of a file set, with the content digest of each file as it was read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSetHash {
    pub hash: String,
    pub files: BTreeMap<ProjectPath, String>,
}

/// Content digest of one file.
pub fn content_digest(contents: &[u8]) -> String {
    blake3::hash(contents).to_hex().to_string()
}

/// Folds a set of files into a digest.
///
/// Implementations must be deterministic and independent of input order.
#[async_trait]
pub trait HashService: Send + Sync {
    async fn hash_files(&self, files: &[ProjectPath]) -> Result<FileSetHash, DevDepError>;
}

/// BLAKE3 hasher over file contents on disk.
pub struct FileHasher {
    project_root: PathBuf,
}

impl FileHasher {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Computes the digest of `(path, contents)` pairs.
    ///
    /// Each file is reduced to its content digest, then the set is folded in
    /// path order.
    pub fn digest(entries: Vec<(ProjectPath, Vec<u8>)>) -> FileSetHash {
        let files: BTreeMap<ProjectPath, String> = entries
            .into_iter()
            .map(|(path, contents)| (path, content_digest(&contents)))
            .collect();

        let mut hasher = blake3::Hasher::new();
        for (path, digest) in &files {
            hasher.update(path.as_str().as_bytes());
            hasher.update(&[0]);
            hasher.update(digest.as_bytes());
        }
        FileSetHash {
            hash: hasher.finalize().to_hex().to_string(),
            files,
        }
    }
}

#[async_trait]
impl HashService for FileHasher {
    async fn hash_files(&self, files: &[ProjectPath]) -> Result<FileSetHash, DevDepError> {
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let path = file.to_absolute(&self.project_root);
            let contents = tokio::fs::read(&path)
                .await
                .map_err(|source| DevDepError::Hash { path, source })?;
            entries.push((file.clone(), contents));
        }
        Ok(Self::digest(entries))
    }
}

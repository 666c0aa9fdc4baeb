use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};

use crate::content::error::{StoreError, StoreResult};
use crate::content::line_index::LineIndex;
use crate::core::model::{FileRef, ProjectId};
use crate::core::sync::{read_lock, write_lock};

/// Reads the current text of a tracked file
pub trait ContentSource: Send + Sync {
    fn read_content(&self, file: &FileRef) -> io::Result<String>;
}

/// SHA-256 of the UTF-8 bytes of `text`, as lowercase hex
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn lock_error(message: String) -> StoreError {
    StoreError::Lock { message }
}

/// Per-file content and hash cache
///
/// Entries are created lazily and only recomputed after an explicit
/// invalidation. Content is kept in memory for every file that was hashed or
/// uploaded; that growth is unbounded for large projects and accepted.
pub struct ContentStore {
    source: Arc<dyn ContentSource>,
    hashes: RwLock<HashMap<FileRef, String>>,
    contents: RwLock<HashMap<FileRef, Arc<str>>>,
}

impl ContentStore {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            source,
            hashes: RwLock::new(HashMap::new()),
            contents: RwLock::new(HashMap::new()),
        }
    }

    /// Cached hash of the file, computed from cached content on a miss
    pub fn get_hash(&self, file: &FileRef) -> StoreResult<String> {
        if let Some(hash) = read_lock(&self.hashes, "content hash", lock_error)?.get(file) {
            return Ok(hash.clone());
        }

        let content = self.get_content(file)?;
        let hash = hash_text(&content);
        write_lock(&self.hashes, "content hash", lock_error)?
            .insert(file.clone(), hash.clone());
        Ok(hash)
    }

    /// Re-read the file, store its new hash and report whether it differs
    ///
    /// A file without a stored hash counts as changed.
    pub fn is_changed(&self, file: &FileRef) -> StoreResult<bool> {
        let content = self.read_direct(file)?;
        let new_hash = hash_text(&content);

        write_lock(&self.contents, "content", lock_error)?
            .insert(file.clone(), Arc::from(content));
        let old_hash = write_lock(&self.hashes, "content hash", lock_error)?
            .insert(file.clone(), new_hash.clone());

        Ok(old_hash.as_deref() != Some(new_hash.as_str()))
    }

    /// Cached content of the file, read through the source on a miss
    pub fn get_content(&self, file: &FileRef) -> StoreResult<Arc<str>> {
        if let Some(content) = read_lock(&self.contents, "content", lock_error)?.get(file) {
            return Ok(content.clone());
        }

        let content: Arc<str> = Arc::from(self.read_direct(file)?);
        write_lock(&self.contents, "content", lock_error)?.insert(file.clone(), content.clone());
        Ok(content)
    }

    /// Read the file bypassing the cache
    pub fn read_direct(&self, file: &FileRef) -> StoreResult<String> {
        self.source
            .read_content(file)
            .map_err(|e| StoreError::Read {
                path: file.to_string(),
                message: e.to_string(),
            })
    }

    pub fn line_index(&self, file: &FileRef) -> StoreResult<LineIndex> {
        Ok(LineIndex::new(&self.get_content(file)?))
    }

    pub fn invalidate(&self, file: &FileRef) -> StoreResult<()> {
        write_lock(&self.hashes, "content hash", lock_error)?.remove(file);
        write_lock(&self.contents, "content", lock_error)?.remove(file);
        Ok(())
    }

    pub fn invalidate_project(&self, project: &ProjectId) -> StoreResult<()> {
        write_lock(&self.hashes, "content hash", lock_error)?
            .retain(|file, _| file.project() != project);
        write_lock(&self.contents, "content", lock_error)?
            .retain(|file, _| file.project() != project);
        Ok(())
    }

    /// True when either a hash or content entry exists for the file
    pub fn is_cached(&self, file: &FileRef) -> StoreResult<bool> {
        Ok(read_lock(&self.hashes, "content hash", lock_error)?.contains_key(file)
            || read_lock(&self.contents, "content", lock_error)?.contains_key(file))
    }
}

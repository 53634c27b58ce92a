//! netplan document storage
//!
//! Documents are always read fresh from disk; the file is the single source
//! of truth because `netplan` and hand edits change it outside this process.
//! Writes go through a temporary file in the same directory followed by a
//! rename, so readers only ever see the old or the new document.

use crate::document::NetworkDocument;
use crate::error::{NetplanError, NetplanResult};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// netplan refuses to be quiet about group/world readable files holding
/// Wi-Fi passwords.
const DOCUMENT_MODE: u32 = 0o600;

/// Load/save access to netplan documents with a per-path writer lock
#[derive(Default)]
pub struct DocumentStore {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the document at `path`.
    ///
    /// A missing file is not an error: the bootstrap skeleton is returned and
    /// the caller's section is created on demand.
    pub fn load(path: &Path) -> NetplanResult<NetworkDocument> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist, using bootstrap document", path.display());
                return Ok(NetworkDocument::bootstrap());
            }
            Err(e) => return Err(NetplanError::read_failed(path, e)),
        };

        NetworkDocument::from_yaml(&text).map_err(|e| NetplanError::malformed(path, e))
    }

    /// Serialize `doc` and atomically replace the file at `path`.
    pub fn save(path: &Path, doc: &NetworkDocument) -> NetplanResult<()> {
        stage_document(path, doc)?
            .commit()
            .map_err(|e| NetplanError::write_failed(path, e))?;
        info!("Saved netplan document {}", path.display());
        Ok(())
    }

    /// Run one load -> change -> save cycle while holding the writer lock for
    /// `path`. Nothing is written if `change` fails.
    pub async fn update<F>(&self, path: &Path, change: F) -> NetplanResult<NetworkDocument>
    where
        F: FnOnce(NetworkDocument) -> NetplanResult<NetworkDocument>,
    {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;

        let current = Self::load(path)?;
        let next = change(current)?;
        Self::save(path, &next)?;
        Ok(next)
    }

    /// Change two documents as one unit.
    ///
    /// Both writer locks are taken in path order, both documents are loaded
    /// and changed, and only then is anything written. A failure in either
    /// change leaves both files untouched. A document the change leaves as it
    /// was is not rewritten.
    pub async fn update_pair<F, G>(
        &self,
        first: &Path,
        change_first: F,
        second: &Path,
        change_second: G,
    ) -> NetplanResult<()>
    where
        F: FnOnce(NetworkDocument) -> NetplanResult<NetworkDocument>,
        G: FnOnce(NetworkDocument) -> NetplanResult<NetworkDocument>,
    {
        if first == second {
            self.update(first, |doc| change_second(change_first(doc)?))
                .await?;
            return Ok(());
        }

        let (low, high) = if first < second { (first, second) } else { (second, first) };
        let low_lock = self.lock_for(low);
        let high_lock = self.lock_for(high);
        let _low = low_lock.lock().await;
        let _high = high_lock.lock().await;

        let first_current = Self::load(first)?;
        let second_current = Self::load(second)?;
        let first_next = change_first(first_current.clone())?;
        let second_next = change_second(second_current.clone())?;

        let mut staged = Vec::with_capacity(2);
        for (path, current, next) in [
            (first, &first_current, &first_next),
            (second, &second_current, &second_next),
        ] {
            if current == next {
                debug!("{} unchanged, not rewritten", path.display());
                continue;
            }
            staged.push(stage_document(path, next)?);
        }

        for write in staged {
            let path = write.target.clone();
            write
                .commit()
                .map_err(|e| NetplanError::write_failed(&path, e))?;
            info!("Saved netplan document {}", path.display());
        }
        Ok(())
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }
}

fn stage_document(path: &Path, doc: &NetworkDocument) -> NetplanResult<StagedWrite> {
    let yaml = doc
        .to_yaml()
        .map_err(|e| NetplanError::write_failed(path, format!("serialize: {}", e)))?;
    StagedWrite::new(path, yaml.as_bytes()).map_err(|e| NetplanError::write_failed(path, e))
}

/// Content synced to a temporary file next to its target, waiting for the
/// rename. Dropped without `commit` the temporary file is removed.
struct StagedWrite {
    tmp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedWrite {
    fn new(path: &Path, content: &[u8]) -> io::Result<Self> {
        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let tmp = parent_dir(path).join(format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            uuid::Uuid::new_v4().simple()
        ));

        let staged = Self {
            tmp,
            target: path.to_path_buf(),
            committed: false,
        };

        let mut f = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(DOCUMENT_MODE)
            .open(&staged.tmp)?;
        f.write_all(content)?;
        f.sync_all()?;
        Ok(staged)
    }

    fn commit(mut self) -> io::Result<()> {
        fs::rename(&self.tmp, &self.target)?;
        self.committed = true;
        File::open(parent_dir(&self.target))?.sync_all()
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    }
}

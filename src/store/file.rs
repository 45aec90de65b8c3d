use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use log::{info, warn};

use super::{HeaderStore, StoreError};
use crate::blockchain::{Hash256, StoredHeader};
use crate::consensus::NetworkParams;

const LOG_FILE: &str = "headers.jsonl";
const HEAD_FILE: &str = "head";
const HEAD_TMP_FILE: &str = "head.tmp";

/// Disk-backed store: an append-only JSON-lines log of every stored header
/// plus a one-line head record, with an in-memory index rebuilt on open.
///
/// The head record is only ever rewritten to name a header whose log line
/// has already been flushed, so a restart never sees a dangling head.
#[derive(Debug)]
pub struct FileHeaderStore {
    dir: PathBuf,
    log: Mutex<BufWriter<File>>,
    headers: RwLock<HashMap<Hash256, StoredHeader>>,
    head: RwLock<Hash256>,
}

impl FileHeaderStore {
    /// Open (or create) the store under `dir`. A fresh directory starts
    /// at the genesis header of `params`.
    pub fn open(dir: impl AsRef<Path>, params: &NetworkParams) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let headers = replay_log(&dir.join(LOG_FILE))?;
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))?;

        let genesis = StoredHeader::genesis(params.genesis)
            .map_err(|e| StoreError::Corrupt(format!("genesis header: {e}")))?;
        let genesis_hash = genesis.hash();

        let head_path = dir.join(HEAD_FILE);
        let fresh = !head_path.exists();
        if !fresh && !headers.contains_key(&genesis_hash) {
            return Err(StoreError::Corrupt(format!(
                "store at {} does not contain genesis {genesis_hash}",
                dir.display()
            )));
        }

        let store = Self {
            dir,
            log: Mutex::new(BufWriter::new(log)),
            headers: RwLock::new(headers),
            head: RwLock::new(genesis_hash),
        };

        if fresh {
            store.put(genesis.clone())?;
            store.set_chain_head(&genesis)?;
        } else {
            let raw = fs::read_to_string(&head_path)?;
            let head: Hash256 = raw
                .trim()
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("head record: {e}")))?;
            if !store.contains(&head)? {
                return Err(StoreError::UnknownHead(head));
            }
            *store.head.write().expect("rwlock poisoned") = head;
        }

        info!(
            "opened header store at {} ({} headers)",
            store.dir.display(),
            store.headers.read().expect("rwlock poisoned").len()
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

fn replay_log(path: &Path) -> Result<HashMap<Hash256, StoredHeader>, StoreError> {
    let mut headers = HashMap::new();
    if !path.exists() {
        return Ok(headers);
    }

    let raw = fs::read_to_string(path)?;
    let complete = raw.ends_with('\n');
    let lines: Vec<&str> = raw.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredHeader>(line) {
            Ok(stored) => {
                headers.insert(stored.hash(), stored);
            }
            // an interrupted append leaves an unterminated last line
            Err(e) if idx + 1 == lines.len() && !complete => {
                warn!("ignoring truncated record at end of {}: {e}", path.display());
            }
            Err(e) => {
                return Err(StoreError::Corrupt(format!(
                    "{} line {}: {e}",
                    path.display(),
                    idx + 1
                )));
            }
        }
    }
    Ok(headers)
}

impl HeaderStore for FileHeaderStore {
    fn get(&self, hash: &Hash256) -> Result<Option<StoredHeader>, StoreError> {
        Ok(self.headers.read().expect("rwlock poisoned").get(hash).cloned())
    }

    fn put(&self, header: StoredHeader) -> Result<(), StoreError> {
        let hash = header.hash();
        // held across the check so concurrent writers append each hash once
        let mut log = self.log.lock().expect("mutex poisoned");
        if self.contains(&hash)? {
            return Ok(());
        }

        let mut line = serde_json::to_string(&header)?;
        line.push('\n');
        log.write_all(line.as_bytes())?;
        log.flush()?;

        self.headers
            .write()
            .expect("rwlock poisoned")
            .insert(hash, header);
        Ok(())
    }

    fn chain_head(&self) -> Result<StoredHeader, StoreError> {
        let head = *self.head.read().expect("rwlock poisoned");
        self.get(&head)?
            .ok_or_else(|| StoreError::Corrupt(format!("head {head} missing from store")))
    }

    fn set_chain_head(&self, head: &StoredHeader) -> Result<(), StoreError> {
        let hash = head.hash();
        if !self.contains(&hash)? {
            return Err(StoreError::UnknownHead(hash));
        }

        let tmp = self.dir.join(HEAD_TMP_FILE);
        {
            let mut file = File::create(&tmp)?;
            writeln!(file, "{hash}")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.dir.join(HEAD_FILE))?;

        *self.head.write().expect("rwlock poisoned") = hash;
        Ok(())
    }
}

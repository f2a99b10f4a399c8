//! Primary/backup snapshot protocol.
//!
//! # Startup
//!
//! - Primary present: read it into the store and mirror every loaded record
//!   into a freshly created backup.
//! - Primary absent: read the backup (if any) and mirror every loaded record
//!   into a freshly created primary. Neither file present is a first run and
//!   yields an empty store.
//!
//! After a successful startup both files hold the same records, so a crash
//! during the next shutdown write still leaves one intact copy.
//!
//! # Shutdown
//!
//! Every account is forced offline and written to the primary. The backup is
//! left alone and stays one generation behind.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use userdb_core::AccountStore;

use crate::error::StorageError;
use crate::traits::RecordCodec;

/// Which file the store was restored from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    /// Neither file existed.
    Empty,
}

/// Summary of a startup load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub source: LoadSource,
    /// Records inserted into the store (and mirrored).
    pub loaded: usize,
    /// Records dropped because they were corrupt or rejected by the store.
    pub skipped: usize,
    /// Trailing bytes shorter than one record.
    pub truncated_bytes: usize,
}

impl LoadReport {
    fn empty() -> Self {
        LoadReport {
            source: LoadSource::Empty,
            loaded: 0,
            skipped: 0,
            truncated_bytes: 0,
        }
    }
}

/// The pair of snapshot files backing one store.
#[derive(Debug, Clone)]
pub struct SnapshotFiles {
    primary: PathBuf,
    backup: PathBuf,
}

impl SnapshotFiles {
    pub fn new(primary: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        SnapshotFiles {
            primary: primary.into(),
            backup: backup.into(),
        }
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Restores `store` from disk and mirrors what was loaded.
    ///
    /// Loaded accounts are always offline. Records that fail to decode, or
    /// that the store rejects, are logged and skipped; they are not mirrored.
    pub fn load_into<C: RecordCodec>(
        &self,
        store: &mut AccountStore,
        codec: &C,
    ) -> Result<LoadReport, StorageError> {
        let primary_exists = self
            .primary
            .try_exists()
            .map_err(|e| StorageError::open(&self.primary, e))?;

        let (source, read_path, write_path) = if primary_exists {
            (LoadSource::Primary, &self.primary, &self.backup)
        } else {
            (LoadSource::Backup, &self.backup, &self.primary)
        };

        let reader = match File::open(read_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound && source == LoadSource::Backup => {
                info!(
                    primary = %self.primary.display(),
                    backup = %self.backup.display(),
                    "no snapshot found, starting with an empty store"
                );
                return Ok(LoadReport::empty());
            }
            Err(e) => return Err(StorageError::open(read_path, e)),
        };
        // Checked before the mirror is created, which truncates it.
        let is_file = reader
            .metadata()
            .map_err(|e| StorageError::open(read_path, e))?
            .is_file();
        if !is_file {
            return Err(StorageError::open(
                read_path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let writer = File::create(write_path).map_err(|e| StorageError::open(write_path, e))?;

        let mut reader = BufReader::new(reader);
        let mut writer = BufWriter::new(writer);
        let mut record = vec![0u8; codec.record_size()];
        let mut mirrored = vec![0u8; codec.record_size()];
        let mut report = LoadReport {
            source,
            ..LoadReport::empty()
        };

        loop {
            let filled = read_full(&mut reader, &mut record)?;
            if filled == 0 {
                break;
            }
            if filled < record.len() {
                warn!(
                    path = %read_path.display(),
                    bytes = filled,
                    "ignoring truncated record at end of snapshot"
                );
                report.truncated_bytes = filled;
                break;
            }

            let mut account = match codec.decode(&record) {
                Ok(account) => account,
                Err(e) if e.is_record_error() => {
                    warn!(path = %read_path.display(), error = %e, "skipping corrupt record");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            account.online = false;
            codec.encode(&account, &mut mirrored);

            let id = account.id;
            match store.insert(account) {
                Ok(()) => {
                    writer.write_all(&mirrored)?;
                    report.loaded += 1;
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "skipping record rejected by store");
                    report.skipped += 1;
                }
            }
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;

        info!(
            source = ?report.source,
            loaded = report.loaded,
            skipped = report.skipped,
            mirror = %write_path.display(),
            "snapshot loaded"
        );
        Ok(report)
    }

    /// Writes every account to the primary with its session flag cleared.
    ///
    /// The records go to a temporary sibling first and are renamed over the
    /// primary once synced, so an interrupted save leaves the old primary.
    /// The store itself is not modified, so a failed save can be retried.
    pub fn save<C: RecordCodec>(
        &self,
        store: &AccountStore,
        codec: &C,
    ) -> Result<usize, StorageError> {
        let staging = staging_path(&self.primary);
        let file = File::create(&staging).map_err(|e| StorageError::open(&staging, e))?;
        let mut writer = BufWriter::new(file);
        let mut record = vec![0u8; codec.record_size()];
        let mut written = 0;

        for account in store.iter() {
            let mut offline = account.clone();
            offline.online = false;
            codec.encode(&offline, &mut record);
            writer.write_all(&record)?;
            written += 1;
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&staging, &self.primary)?;

        info!(
            path = %self.primary.display(),
            accounts = written,
            "snapshot saved"
        );
        Ok(written)
    }
}

fn staging_path(primary: &Path) -> PathBuf {
    let mut name = primary.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Reads until `buf` is full or the stream ends; returns bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("snapshot read interrupted, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

use super::{ProgressionStore, StorageError};
use crate::core::constants::SAVE_VERSION_MAGIC;
use crate::core::state::{MeditationSnapshot, PlayerRecord};
use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One checksummed binary save file per player.
///
/// File format:
/// - Version magic (8 bytes)
/// - Data length (4 bytes)
/// - Bincode-serialized `PlayerRecord` (variable length)
/// - SHA256 checksum over the three fields above (32 bytes)
///
/// Writes go to a temp file that is renamed over the target, so a reader
/// never sees a half-written record.
pub struct FileStore {
    dir: PathBuf,
    // Serializes read-patch-write of snapshots against full writes
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Uses the platform data directory from the `directories` crate.
    pub fn new() -> io::Result<Self> {
        let project_dirs = ProjectDirs::from("", "", "cultivation").ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Self::in_dir(project_dirs.data_dir())
    }

    pub fn in_dir(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.dat", file_stem(user_id)))
    }

    fn read(&self, user_id: &str) -> Result<Option<PlayerRecord>, StorageError> {
        let bytes = match fs::read(self.record_path(user_id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = decode(&bytes)?;
        if record.user_id() != user_id {
            return Err(StorageError::Corrupt(format!(
                "save for {} holds player {}",
                user_id,
                record.user_id()
            )));
        }
        Ok(Some(record))
    }

    fn write(&self, record: &PlayerRecord) -> Result<(), StorageError> {
        let bytes = encode(record)?;
        let path = self.record_path(record.user_id());
        let tmp = path.with_extension("dat.tmp");

        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, StorageError> {
        self.write_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("save lock poisoned".to_string()))
    }
}

impl ProgressionStore for FileStore {
    fn load(&self, user_id: &str) -> Result<Option<PlayerRecord>, StorageError> {
        self.read(user_id)
    }

    fn save_record(&self, record: &PlayerRecord) -> Result<(), StorageError> {
        let _guard = self.lock()?;
        self.write(record)
    }

    fn write_snapshot(&self, snapshot: &MeditationSnapshot) -> Result<(), StorageError> {
        let _guard = self.lock()?;
        let mut record = self
            .read(&snapshot.user_id)?
            .ok_or_else(|| StorageError::MissingRecord(snapshot.user_id.clone()))?;
        snapshot.apply_to(&mut record.progression);
        self.write(&record)
    }
}

/// Serialize a record into the checksummed save format.
pub fn encode(record: &PlayerRecord) -> Result<Vec<u8>, StorageError> {
    let data = bincode::serialize(record).map_err(|e| StorageError::Encode(e.to_string()))?;
    let data_len = u32::try_from(data.len())
        .map_err(|_| StorageError::Encode("record too large".to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(SAVE_VERSION_MAGIC.to_le_bytes());
    hasher.update(data_len.to_le_bytes());
    hasher.update(&data);
    let checksum = hasher.finalize();

    let mut out = Vec::with_capacity(8 + 4 + data.len() + 32);
    out.extend_from_slice(&SAVE_VERSION_MAGIC.to_le_bytes());
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&checksum);
    Ok(out)
}

/// Verify and deserialize a checksummed save.
///
/// Returns `Corrupt` if:
/// - The file is truncated
/// - The version magic is incorrect
/// - The checksum verification fails
/// - The data cannot be deserialized
pub fn decode(bytes: &[u8]) -> Result<PlayerRecord, StorageError> {
    if bytes.len() < 8 + 4 + 32 {
        return Err(StorageError::Corrupt("truncated save".to_string()));
    }

    let (version_bytes, rest) = bytes.split_at(8);
    let version = u64::from_le_bytes(version_bytes.try_into().unwrap_or([0; 8]));
    if version != SAVE_VERSION_MAGIC {
        return Err(StorageError::Corrupt(format!(
            "invalid save version: expected 0x{:016X}, got 0x{:016X}",
            SAVE_VERSION_MAGIC, version
        )));
    }

    let (length_bytes, rest) = rest.split_at(4);
    let data_len = u32::from_le_bytes(length_bytes.try_into().unwrap_or([0; 4])) as usize;
    if rest.len() != data_len + 32 {
        return Err(StorageError::Corrupt("length mismatch".to_string()));
    }
    let (data, stored_checksum) = rest.split_at(data_len);

    let mut hasher = Sha256::new();
    hasher.update(version_bytes);
    hasher.update(length_bytes);
    hasher.update(data);
    let computed = hasher.finalize();
    if stored_checksum != computed.as_slice() {
        return Err(StorageError::Corrupt(
            "checksum verification failed".to_string(),
        ));
    }

    bincode::deserialize(data).map_err(|e| StorageError::Corrupt(e.to_string()))
}

/// Hex of the id's UTF-8 bytes: a valid file name for any id, and
/// distinct ids never share a file.
fn file_stem(user_id: &str) -> String {
    user_id.bytes().map(|b| format!("{:02x}", b)).collect()
}

use bytes::Bytes;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WriteMode {
    Overwrite,
    NoOverwrite,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SyncMode {
    Sync,
    NoSync,
}

/// Env is the filesystem seam for everything the metadata store touches on
/// disk. Production code uses `StdEnv`; tests may substitute their own.
pub trait Env: Send + Sync {
    fn file_exists(&self, path: &Path) -> bool;

    fn delete_file(&self, path: &Path) -> io::Result<()>;

    fn file_size(&self, path: &Path) -> io::Result<u64>;

    /// Creates `dir` if it does not exist. Returns true if this call created
    /// it, in which case the caller is responsible for syncing the parent
    /// directory.
    fn create_dir_if_missing(&self, dir: &Path) -> io::Result<bool>;

    fn sync_dir(&self, dir: &Path) -> io::Result<()>;

    /// Writes `payload` to `path`. The replacement of an existing file is
    /// atomic: readers observe either the old content or the new, never a
    /// partial write. `SyncMode::Sync` guarantees the data is on disk before
    /// this returns.
    fn write_file(
        &self,
        path: &Path,
        payload: &[u8],
        write_mode: WriteMode,
        sync_mode: SyncMode,
    ) -> io::Result<()>;

    fn read_file(&self, path: &Path) -> io::Result<Bytes>;
}

/// Env backed by std::fs. Atomic replacement is write-temp + rename, with the
/// parent directory synced afterwards when a durable write was requested.
pub struct StdEnv;

impl Env for StdEnv {
    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn create_dir_if_missing(&self, dir: &Path) -> io::Result<bool> {
        match fs::create_dir(dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        File::open(dir)?.sync_all()
    }

    fn write_file(
        &self,
        path: &Path,
        payload: &[u8],
        write_mode: WriteMode,
        sync_mode: SyncMode,
    ) -> io::Result<()> {
        if write_mode == WriteMode::NoOverwrite && path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = std::path::PathBuf::from(tmp_name);
        {
            let mut tmp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            tmp.write_all(payload)?;
            if sync_mode == SyncMode::Sync {
                tmp.sync_all()?;
            }
        }
        fs::rename(&tmp_path, path)?;

        if sync_mode == SyncMode::Sync {
            if let Some(parent) = path.parent() {
                self.sync_dir(parent)?;
            }
        }
        Ok(())
    }

    fn read_file(&self, path: &Path) -> io::Result<Bytes> {
        Ok(Bytes::from(fs::read(path)?))
    }
}

use crate::{Error, Result, store::Store};
use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Permissions applied to the record on every startup.
#[cfg(unix)]
const RECORD_MODE: u32 = 0o644;

/// A [`Store`] backed by one text file containing the ASCII decimal digits of
/// the last issued identifier.
///
/// Every [`persist`](Store::persist) writes a sibling `<name>.tmp` file,
/// syncs it, and renames it over the record. A crash at any point leaves either
/// the previous or the new value on disk, never a torn one.
///
/// ```no_run
/// use uidpool::{FileStore, Store};
///
/// let mut store = FileStore::new("last-used-id.txt");
/// let last = store.initialize()?;
/// store.persist(last.map_or(1, |v| v + 1))?;
/// # Ok::<(), uidpool::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    tmp_path: PathBuf,
    sync: bool,
}

impl FileStore {
    /// Creates a store for `path`. Nothing touches the filesystem until
    /// [`initialize`](Store::initialize).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
            sync: true,
        }
    }

    /// Controls whether writes are `fsync`-ed before being reported durable.
    ///
    /// Enabled by default. Disabling it trades crash safety for throughput.
    #[must_use]
    pub const fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Path of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, id: u64) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(RECORD_MODE);
        }

        let mut tmp = options.open(&self.tmp_path)?;
        tmp.write_all(id.to_string().as_bytes())?;
        if self.sync {
            tmp.sync_all()?;
        }
        drop(tmp);

        fs::rename(&self.tmp_path, &self.path)?;

        // The rename itself lives in the directory entry.
        #[cfg(unix)]
        if self.sync {
            if let Some(dir) = self.path.parent() {
                let dir = if dir.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    dir
                };
                File::open(dir)?.sync_all()?;
            }
        }

        Ok(())
    }
}

impl Store for FileStore {
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), fields(path = %self.path.display())))]
    fn initialize(&mut self) -> Result<Option<u64>> {
        let init_err = |e: io::Error| Error::store_init(&self.path, e);

        // An existing record is opened only after the chmod, which can
        // repair a read-only one.
        match fs::metadata(&self.path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&self.path)
                    .map_err(init_err)?;
            }
            Err(e) => return Err(init_err(e)),
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(RECORD_MODE))
                .map_err(init_err)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(init_err)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(init_err)?;

        let last = parse_record(&self.path, &contents)?;

        #[cfg(feature = "tracing")]
        match last {
            Some(last) => tracing::debug!("Store holds last issued id {last}"),
            None => tracing::debug!("Store is empty, no ids issued yet"),
        }

        Ok(last)
    }

    fn persist(&mut self, id: u64) -> Result<()> {
        self.write_record(id)
            .map_err(|source| Error::Persist { id, source })
    }
}

/// Parses the record's contents.
///
/// Surrounding ASCII whitespace is ignored, so a hand-edited file with a
/// trailing newline still loads. Anything other than plain decimal digits
/// that fit a `u64` is corruption.
pub(crate) fn parse_record(path: &Path, contents: &[u8]) -> Result<Option<u64>> {
    let digits = contents.trim_ascii();
    if digits.is_empty() {
        return Ok(None);
    }

    let corrupted = || Error::Corrupted {
        path: path.to_path_buf(),
        contents: String::from_utf8_lossy(contents).into_owned(),
    };

    // `u64::from_str` would also accept a leading `+`.
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(corrupted());
    }

    // All ASCII digits, so valid UTF-8.
    let digits = core::str::from_utf8(digits).map_err(|_| corrupted())?;
    digits.parse::<u64>().map(Some).map_err(|_| corrupted())
}

//! Opening GnuCash books the way GnuCash itself does: one session per book,
//! guarded by a row in the `gnclock` table while it is open for writing.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::Repository;

const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unsupported book backend '{0}': only SQLite books can be opened")]
    UnsupportedBackend(String),

    #[error("Book not found: {0}")]
    NotFound(String),

    #[error("Book already exists: {0}")]
    StoreExists(String),

    #[error("Not a GnuCash SQLite book: {0}")]
    NotABook(String),

    #[error("Book {path} is locked by {holder}")]
    Locked { path: String, holder: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// No lock is taken and the connection cannot write
    ReadOnly,
    /// Fails if another session holds the lock
    NormalOpen,
    /// Removes whatever lock is present, then locks
    BreakLock,
    /// Creates a book in a file that must not exist yet
    NewStore,
}

/// Turn a book location into a file path. Accepts plain paths and the
/// `sqlite3://` and `file://` schemes.
pub fn book_path(location: &str) -> Result<PathBuf, SessionError> {
    let location = location.trim();
    match location.split_once("://") {
        None => Ok(PathBuf::from(location)),
        Some(("sqlite3" | "file", path)) if !path.is_empty() => Ok(PathBuf::from(path)),
        Some(("sqlite3" | "file", _)) => Err(SessionError::NotFound(location.to_string())),
        Some((scheme, _)) => Err(SessionError::UnsupportedBackend(scheme.to_string())),
    }
}

#[derive(Debug, Clone)]
struct LockOwner {
    hostname: String,
    pid: i64,
}

impl LockOwner {
    fn current() -> Self {
        let hostname = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "localhost".to_string());
        Self {
            hostname,
            pid: i64::from(std::process::id()),
        }
    }
}

pub struct Session {
    path: PathBuf,
    mode: SessionMode,
    repo: Repository,
    lock: Option<LockOwner>,
}

impl Session {
    pub async fn open(location: &str, mode: SessionMode) -> Result<Self, SessionError> {
        let path = book_path(location)?;
        let display_path = path.display().to_string();

        let pool = match mode {
            SessionMode::NewStore => {
                if path.exists() {
                    return Err(SessionError::StoreExists(display_path));
                }
                connect(&path, false, true).await?
            }
            SessionMode::ReadOnly | SessionMode::NormalOpen | SessionMode::BreakLock => {
                if !path.is_file() {
                    return Err(SessionError::NotFound(display_path));
                }
                check_header(&path)?;
                connect(&path, mode == SessionMode::ReadOnly, false).await?
            }
        };
        let repo = Repository::new(pool);

        if mode == SessionMode::NewStore {
            if let Err(e) = repo.create_book().await {
                repo.pool().close().await;
                discard_new_store(&path);
                return Err(e.into());
            }
            info!(path = %display_path, "created new book");
        } else if !repo.table_exists("books").await? {
            repo.pool().close().await;
            return Err(SessionError::NotABook(display_path));
        }

        let mut session = Self {
            path,
            mode,
            repo,
            lock: None,
        };
        if mode != SessionMode::ReadOnly {
            if let Err(e) = session.acquire_lock(mode == SessionMode::BreakLock).await {
                session.repo.pool().close().await;
                if mode == SessionMode::NewStore {
                    discard_new_store(&session.path);
                }
                return Err(e);
            }
        }

        debug!(path = %display_path, ?mode, "session opened");
        Ok(session)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Release the lock and close the connection. The connection is closed
    /// even if the lock cannot be released.
    pub async fn end(self) -> Result<(), SessionError> {
        let released = match &self.lock {
            Some(owner) => sqlx::query("DELETE FROM gnclock WHERE Hostname = ? AND PID = ?")
                .bind(&owner.hostname)
                .bind(owner.pid)
                .execute(self.repo.pool())
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        self.repo.pool().close().await;
        debug!(path = %self.path.display(), "session ended");
        Ok(released?)
    }

    async fn acquire_lock(&mut self, break_lock: bool) -> Result<(), SessionError> {
        let pool = self.repo.pool();
        let holders = sqlx::query("SELECT Hostname, PID FROM gnclock")
            .fetch_all(pool)
            .await?;

        if let Some(row) = holders.first() {
            let hostname: Option<String> = row.get("Hostname");
            let pid: Option<i64> = row.get("PID");
            let holder = format!(
                "{} (pid {})",
                hostname.unwrap_or_default(),
                pid.unwrap_or_default()
            );
            if !break_lock {
                return Err(SessionError::Locked {
                    path: self.path.display().to_string(),
                    holder,
                });
            }
            warn!(path = %self.path.display(), %holder, "breaking lock");
            sqlx::query("DELETE FROM gnclock").execute(pool).await?;
        }

        let owner = LockOwner::current();
        sqlx::query("INSERT INTO gnclock (Hostname, PID) VALUES (?, ?)")
            .bind(&owner.hostname)
            .bind(owner.pid)
            .execute(pool)
            .await?;
        self.lock = Some(owner);
        Ok(())
    }
}

/// Remove a book file (and its journal) that `NewStore` could not finish.
fn discard_new_store(path: &Path) {
    let mut journal = path.as_os_str().to_owned();
    journal.push("-journal");
    for file in [path.to_path_buf(), PathBuf::from(journal)] {
        if let Err(e) = std::fs::remove_file(&file) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %file.display(), error = %e, "could not remove unfinished book");
            }
        }
    }
}

async fn connect(path: &Path, read_only: bool, create: bool) -> Result<SqlitePool, SessionError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(read_only)
        .create_if_missing(create);
    Ok(SqlitePool::connect_with(options).await?)
}

/// GnuCash XML books are plain or gzipped XML; anything else that is not
/// SQLite is not a book at all.
fn check_header(path: &Path) -> Result<(), SessionError> {
    let mut header = [0u8; 16];
    let mut file = File::open(path)?;
    let mut read = 0;
    while read < header.len() {
        let n = file.read(&mut header[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    let header = &header[..read];

    if header.starts_with(&GZIP_MAGIC) || header.starts_with(b"<?xml") || header.starts_with(b"<gnc") {
        return Err(SessionError::UnsupportedBackend("xml".to_string()));
    }
    if header != SQLITE_HEADER.as_slice() {
        return Err(SessionError::NotABook(path.display().to_string()));
    }
    Ok(())
}

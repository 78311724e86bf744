//! Rename and delete operations that survive short-lived file locks.
//!
//! Freshly written media files are often held open for a moment by virus
//! scanners, indexers or a muxer that is still flushing. Operations that hit
//! such a lock are retried a bounded number of times with a fixed delay.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Raw OS error codes that indicate another process holds the file
#[cfg(windows)]
const LOCK_ERROR_CODES: &[i32] = &[
    32, // ERROR_SHARING_VIOLATION
    33, // ERROR_LOCK_VIOLATION
];
#[cfg(unix)]
const LOCK_ERROR_CODES: &[i32] = &[
    16, // EBUSY
    26, // ETXTBSY
];
#[cfg(not(any(windows, unix)))]
const LOCK_ERROR_CODES: &[i32] = &[];

/// Whether an error is worth retrying
pub fn is_transient(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }

    err.raw_os_error()
        .map(|code| LOCK_ERROR_CODES.contains(&code))
        .unwrap_or(false)
}

/// Filesystem primitives used by the operator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Unlink a file or remove a directory tree; a missing path is not an error
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

/// The local filesystem through `tokio::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

#[async_trait]
impl FileSystem for LocalFs {
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        if metadata.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOperation {
    Rename { from: PathBuf, to: PathBuf },
    Delete { path: PathBuf },
}

impl FileOperation {
    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        FileOperation::Rename {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        FileOperation::Delete { path: path.into() }
    }

    fn source(&self) -> &Path {
        match self {
            FileOperation::Rename { from, .. } => from,
            FileOperation::Delete { path } => path,
        }
    }
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Rename { from, to } => {
                write!(f, "rename {} -> {}", from.display(), to.display())
            }
            FileOperation::Delete { path } => write!(f, "delete {}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Result of a retried operation
#[derive(Debug)]
pub enum OpOutcome {
    Done { attempts: u32 },
    Exhausted { attempts: u32, last_error: io::Error },
}

impl OpOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, OpOutcome::Done { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            OpOutcome::Done { attempts } | OpOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Error of the final attempt, if every attempt failed
    pub fn last_error(&self) -> Option<&io::Error> {
        match self {
            OpOutcome::Done { .. } => None,
            OpOutcome::Exhausted { last_error, .. } => Some(last_error),
        }
    }
}

/// Runs file operations under a retry policy
#[derive(Clone)]
pub struct FileOperator {
    fs: Arc<dyn FileSystem>,
    policy: RetryPolicy,
}

impl FileOperator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_fs(Arc::new(LocalFs), policy)
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>, policy: RetryPolicy) -> Self {
        Self { fs, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `operation`, retrying transient lock errors.
    ///
    /// Non-transient errors are returned as `Err` right away; running out of
    /// attempts is reported as [`OpOutcome::Exhausted`].
    pub async fn execute(&self, operation: &FileOperation) -> io::Result<OpOutcome> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match operation {
                FileOperation::Rename { from, to } => self.fs.rename(from, to).await,
                FileOperation::Delete { path } => self.fs.remove(path).await,
            };

            match result {
                Ok(()) => {
                    tracing::debug!("{} succeeded on attempt {}", operation, attempt);
                    return Ok(OpOutcome::Done { attempts: attempt });
                }
                Err(e) if is_transient(&e) => {
                    if attempt >= max_attempts {
                        tracing::error!(
                            "Failed file operation on {}: {}",
                            operation.source().display(),
                            e
                        );
                        return Ok(OpOutcome::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    tracing::warn!(
                        "File busy, retrying ({}/{}): {}",
                        attempt,
                        max_attempts,
                        operation.source().display()
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

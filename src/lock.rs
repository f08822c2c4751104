//! Keep two identical invocations from running at the same time
//!
//! Each invocation publishes a marker file named after its arguments,
//! holding its pid. The pid is written to a private file first, which is
//! then hard linked to the marker name: the link fails if the marker exists,
//! and a marker that exists always has its pid in it. So exactly one of
//! several racing invocations wins.
//!
//! A marker owned by a live process makes the invocation fail straight away.
//! A marker left behind by a dead process is reclaimed once, by whichever
//! invocation holds the marker's reclaim fence, and only if the marker is
//! still the very file that was found stale.
//!
//! Invocations with different arguments never contend.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use derive_more::From;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::{getpid, Pid};
use tracing::{debug, info};

/// How long a marker without a readable pid, or a reclaim fence, is left
/// alone before it is considered abandoned
const ABANDONED_AFTER: Duration = Duration::from_secs(60);

static PENDING: AtomicUsize = AtomicUsize::new(0);

/// Answers whether a pid belongs to a running process
pub trait Liveness {
    fn is_alive(&self, pid: i32) -> bool;
}

/// Asks the kernel, by sending signal 0
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTable;

impl Liveness for ProcessTable {
    fn is_alive(&self, pid: i32) -> bool {
        if pid <= 0 {
            return false;
        }
        match kill(Pid::from_raw(pid), None) {
            Ok(()) => true,
            // exists, but belongs to somebody else
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

#[derive(Debug, From)]
pub enum LockError {
    /// A live process holds the marker
    #[from(ignore)]
    AlreadyRunning { pid: i32, path: PathBuf },
    /// The marker holds no pid and is too recent to be called abandoned
    #[from(ignore)]
    Unreadable(PathBuf),
    /// The stale marker could not be taken over in one attempt
    #[from(ignore)]
    Reclaim(PathBuf),
    Io(io::Error),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LockError::AlreadyRunning { pid, ref path } => write!(
                f,
                "An instance with the same parameters is already running (pid {}, lock {}).",
                pid,
                path.display()
            ),
            LockError::Unreadable(ref path) => write!(
                f,
                "The lock {} does not name its owner, refusing to run.",
                path.display()
            ),
            LockError::Reclaim(ref path) => write!(
                f,
                "Could not take over the stale lock {}.",
                path.display()
            ),
            LockError::Io(ref e) => write!(f, "Could not create the lock: {}", e),
        }
    }
}

/// Build the lock name for a check invoked with `args`
///
/// The arguments are joined verbatim and everything but ASCII alphanumerics
/// and `-_.=` is stripped, which removes path separators and shell
/// metacharacters.
pub fn signature<S: AsRef<str>>(check: &str, args: &[S]) -> String {
    let mut joined = check.to_owned();
    for arg in args {
        joined.push('_');
        joined.push_str(arg.as_ref());
    }
    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "-_.=".contains(*c))
        .collect()
}

/// An acquired lock, released when dropped
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    dev: u64,
    ino: u64,
}

impl LockGuard {
    /// Take the lock called `signature` in `dir`
    pub fn acquire(
        dir: &Path,
        signature: &str,
        liveness: &dyn Liveness,
    ) -> Result<LockGuard, LockError> {
        acquire_with(dir, signature, liveness, ABANDONED_AFTER)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // only remove the marker if it is still ours
        match fs::metadata(&self.path) {
            Ok(ref meta) if meta.dev() == self.dev && meta.ino() == self.ino => {
                if let Err(e) = fs::remove_file(&self.path) {
                    debug!(path = %self.path.display(), error = %e, "could not remove lock");
                }
            }
            Ok(_) => debug!(path = %self.path.display(), "lock was replaced, leaving it"),
            Err(e) => debug!(path = %self.path.display(), error = %e, "lock is gone"),
        }
    }
}

fn acquire_with(
    dir: &Path,
    signature: &str,
    liveness: &dyn Liveness,
    abandoned_after: Duration,
) -> Result<LockGuard, LockError> {
    let path = dir.join(format!("{}.lock", signature));
    match publish(&path) {
        Ok(guard) => return Ok(guard),
        Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e.into()),
    }

    let seen = match Marker::read(&path) {
        Ok(marker) => marker,
        // released since, try once more
        Err(ref e) if e.kind() == ErrorKind::NotFound => {
            return publish(&path).map_err(|e| {
                debug!(error = %e, "second attempt to create the lock failed");
                LockError::Reclaim(path.clone())
            })
        }
        Err(e) => return Err(e.into()),
    };

    match seen.pid {
        Some(pid) if liveness.is_alive(pid) => {
            return Err(LockError::AlreadyRunning { pid, path });
        }
        Some(pid) => info!(pid, path = %path.display(), "reclaiming lock of dead process"),
        None if seen.age < abandoned_after => return Err(LockError::Unreadable(path)),
        None => info!(path = %path.display(), "reclaiming abandoned lock"),
    }
    reclaim(&path, &seen, abandoned_after)
}

/// Replace the stale marker `seen` at `path` with ours
///
/// Reclaiming is serialized by a fence next to the marker. While the fence
/// is held nobody else can remove the marker, and nobody can publish over
/// it, so a marker that is still `seen` can be removed safely.
fn reclaim(
    path: &Path,
    seen: &Marker,
    abandoned_after: Duration,
) -> Result<LockGuard, LockError> {
    let fence_path = suffixed(path, ".reclaim");
    let fence = match publish(&fence_path) {
        Ok(fence) => fence,
        Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!(fence = %fence_path.display(), "somebody else is reclaiming");
            clear_abandoned(&fence_path, abandoned_after);
            return Err(LockError::Reclaim(path.to_owned()));
        }
        Err(e) => return Err(e.into()),
    };

    match Marker::read(path) {
        Ok(ref now) if now.is_same_file(seen) => {
            if let Err(e) = fs::remove_file(path) {
                debug!(error = %e, "could not remove the stale lock");
                return Err(LockError::Reclaim(path.to_owned()));
            }
        }
        // taken over by an earlier reclaimer
        Ok(now) => {
            return Err(match now.pid {
                Some(pid) => LockError::AlreadyRunning {
                    pid,
                    path: path.to_owned(),
                },
                None => LockError::Reclaim(path.to_owned()),
            })
        }
        Err(ref e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let guard = publish(path).map_err(|e| {
        debug!(error = %e, "second attempt to create the lock failed");
        LockError::Reclaim(path.to_owned())
    });
    drop(fence);
    guard
}

/// Move a fence out of the way if its holder has been at it for too long
///
/// The fence is renamed first, so that of several invocations clearing it
/// only one gets to delete it. A fence that turns out to be fresh is put
/// back.
fn clear_abandoned(fence_path: &Path, abandoned_after: Duration) {
    match Marker::read(fence_path) {
        Ok(ref fence) if fence.age >= abandoned_after => {}
        _ => return,
    }
    let aside = suffixed(fence_path, &format!(".{}.old", unique()));
    if fs::rename(fence_path, &aside).is_err() {
        return;
    }
    match Marker::read(&aside) {
        Ok(ref fence) if fence.age < abandoned_after => {
            if let Err(e) = fs::hard_link(&aside, fence_path) {
                debug!(error = %e, "could not put back a live reclaim fence");
            }
        }
        _ => info!(fence = %fence_path.display(), "removed abandoned reclaim fence"),
    }
    let _ = fs::remove_file(&aside);
}

/// Make a marker with our pid appear at `path`, unless something is there
fn publish(path: &Path) -> io::Result<LockGuard> {
    let pending = suffixed(path, &format!(".{}.tmp", unique()));
    let published = write_and_link(&pending, path);
    if let Err(e) = fs::remove_file(&pending) {
        if e.kind() != ErrorKind::NotFound {
            debug!(path = %pending.display(), error = %e, "could not remove pending lock");
        }
    }
    published
}

fn write_and_link(pending: &Path, path: &Path) -> io::Result<LockGuard> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(pending)?;
    writeln!(file, "{}", getpid())?;
    let meta = file.metadata()?;
    fs::hard_link(pending, path)?;
    debug!(path = %path.display(), "lock acquired");
    Ok(LockGuard {
        path: path.to_owned(),
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

/// A name nobody else in this or any other process uses
fn unique() -> String {
    format!("{}.{}", getpid(), PENDING.fetch_add(1, Ordering::Relaxed))
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// A marker as found on disk
#[derive(Debug)]
struct Marker {
    pid: Option<i32>,
    dev: u64,
    ino: u64,
    age: Duration,
}

impl Marker {
    fn read(path: &Path) -> io::Result<Marker> {
        let mut file = File::open(path)?;
        let meta = file.metadata()?;
        let mut contents = String::new();
        let pid = match file.read_to_string(&mut contents) {
            Ok(_) => contents.trim().parse().ok(),
            // a directory, or not text
            Err(_) => None,
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or_default();
        Ok(Marker {
            pid,
            dev: meta.dev(),
            ino: meta.ino(),
            age,
        })
    }

    fn is_same_file(&self, other: &Marker) -> bool {
        self.dev == other.dev && self.ino == other.ino
    }
}

//! Cross-task cancellation via a real, non-blocking `pipe(2)` pair.
//!
//! The read end is wrapped in [`tokio::io::unix::AsyncFd`] so it can be
//! combined with a source's read future inside a single `select!` — any
//! readable event on the read end (a written byte, or the write end being
//! closed) means "cancellation requested". This mirrors the original
//! self-pipe trick used to interrupt a blocking `pselect()` from another
//! thread; it is kept as a literal construction here rather than replaced
//! with a higher-level cancellation token because the read side composes
//! directly with [`crate::source::Source::read`]'s own fd-based wait.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::unix::AsyncFd;

/// The write half of a self-pipe pair. Signaling is idempotent: a second
/// `signal` or `close` after the first is a no-op.
pub struct SelfPipeWriter {
    fd: RawFd,
    closed: AtomicBool,
}

/// The read half of a self-pipe pair, selectable from async code.
pub struct SelfPipeReader {
    inner: AsyncFd<OwnedRawFd>,
}

struct OwnedRawFd(RawFd);

impl std::os::unix::io::AsRawFd for OwnedRawFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for OwnedRawFd {
    fn drop(&mut self) {
        if self.0 >= 0 {
            unsafe {
                libc::close(self.0);
            }
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Create a fresh self-pipe pair, both ends non-blocking.
pub fn pair() -> io::Result<(SelfPipeReader, SelfPipeWriter)> {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);

    if let Err(e) = set_nonblocking(read_fd).and_then(|_| set_nonblocking(write_fd)) {
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
        return Err(e);
    }

    let reader = SelfPipeReader {
        inner: AsyncFd::new(OwnedRawFd(read_fd))?,
    };
    let writer = SelfPipeWriter {
        fd: write_fd,
        closed: AtomicBool::new(false),
    };
    Ok((reader, writer))
}

impl SelfPipeWriter {
    /// Write a single byte to wake up the reader, then close this end.
    /// Safe to call more than once; subsequent calls do nothing.
    pub fn signal_and_close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        loop {
            let n = unsafe { libc::write(self.fd, b"X".as_ptr() as *const _, 1) };
            if n == -1 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    continue;
                }
            }
            break;
        }
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl Drop for SelfPipeWriter {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) && self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

impl SelfPipeReader {
    /// Resolves once the pipe becomes readable — either a byte was
    /// written, or the write end was closed without writing (EOF). Either
    /// way, the caller should treat this as "canceled".
    pub async fn canceled(&self) {
        loop {
            let mut guard = match self.inner.readable().await {
                Ok(g) => g,
                Err(_) => return,
            };
            // We don't care about draining the byte; any readiness means cancel.
            guard.clear_ready();
            return;
        }
    }
}

/// Convenience wrapper bundling both ends behind an `Arc` so a worker can
/// hand the writer to its supervisor while keeping the reader for itself.
pub fn pair_shared() -> io::Result<(Arc<SelfPipeReader>, Arc<SelfPipeWriter>)> {
    let (r, w) = pair()?;
    Ok((Arc::new(r), Arc::new(w)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_wakes_reader() {
        let (reader, writer) = pair().unwrap();
        writer.signal_and_close();
        tokio::time::timeout(Duration::from_secs(1), reader.canceled())
            .await
            .expect("reader should observe the signal promptly");
    }

    #[tokio::test]
    async fn close_without_write_still_wakes_reader() {
        let (reader, writer) = pair().unwrap();
        drop(writer);
        tokio::time::timeout(Duration::from_secs(1), reader.canceled())
            .await
            .expect("EOF on the write end should also count as cancellation");
    }

    #[tokio::test]
    async fn double_signal_is_idempotent() {
        let (reader, writer) = pair().unwrap();
        writer.signal_and_close();
        writer.signal_and_close();
        tokio::time::timeout(Duration::from_secs(1), reader.canceled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unsignaled_reader_does_not_resolve_immediately() {
        let (reader, _writer) = pair().unwrap();
        let res = tokio::time::timeout(Duration::from_millis(50), reader.canceled()).await;
        assert!(res.is_err(), "reader should not be ready without a signal");
    }
}

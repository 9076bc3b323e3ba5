//! Unix PTY allocation: `openpty` + `fork` + `exec`, a lifeline watchdog that
//! reaps orphaned children if this process dies uncleanly, and an escalating
//! stop sequence. Grounded on the same `openpty`/`fork`/`execvp` sequence as
//! this crate's process-spawning ancestor, generalized from one hardcoded CLI
//! invocation to an arbitrary `program`/`args`/`env`/`cwd`.

use super::{KillMode, SpawnSpec};
use crate::error::PtyError;
use crate::process_signal::signal_process_group_or_pid;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::ptr;
use std::thread;
use std::time::Duration;
use tokio::sync::watch;

const READ_CHUNK: usize = 16 * 1024;
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// One spawned child living behind a PTY master fd.
pub struct PtyHandle {
    master_fd: RawFd,
    lifeline_write_fd: RawFd,
    child_pid: i32,
    output_rx: Receiver<Vec<u8>>,
    _reader_thread: thread::JoinHandle<()>,
    exit_rx: watch::Receiver<Option<i32>>,
    closed: bool,
}

impl PtyHandle {
    /// Allocate a pty, fork, and exec `spec.program` in the child.
    pub fn spawn(spec: SpawnSpec<'_>) -> Result<Self, PtyError> {
        if spec.rows == 0 || spec.cols == 0 {
            return Err(PtyError::BadSize { rows: spec.rows, cols: spec.cols });
        }

        let cwd = spec.cwd.unwrap_or(".");
        let cwd_c = CString::new(cwd).map_err(|_| {
            PtyError::SpawnFailed { os_error: io::Error::new(io::ErrorKind::InvalidInput, "cwd contains NUL") }
        })?;

        let mut argv: Vec<CString> = Vec::with_capacity(spec.args.len() + 1);
        argv.push(cstr_arg(spec.program)?);
        for arg in spec.args {
            argv.push(cstr_arg(arg)?);
        }

        let env_overrides: Vec<(CString, Option<CString>)> = spec
            .env
            .iter()
            .map(|(k, v)| -> Result<_, PtyError> {
                let key = cstr_arg(k)?;
                let val = match v {
                    Some(v) => Some(cstr_arg(v)?),
                    None => None,
                };
                Ok((key, val))
            })
            .collect::<Result<_, _>>()?;

        // SAFETY: argv/cwd are valid CStrings; spawn_child forks immediately
        // after allocating the pty and never touches Rust-managed heap state
        // across the fork boundary from the child side beyond raw libc calls.
        let (master_fd, lifeline_write_fd, child_pid) = unsafe {
            spawn_child(&argv, &cwd_c, &env_overrides, spec.rows, spec.cols)
                .map_err(|os_error| PtyError::SpawnFailed { os_error })?
        };

        // SAFETY: master_fd was just returned by spawn_child and is owned here.
        unsafe { set_nonblocking(master_fd) }.map_err(PtyError::Io)?;

        let (tx, output_rx) = bounded(OUTPUT_CHANNEL_CAPACITY);
        let reader_thread = spawn_reader_thread(master_fd, tx);

        let (exit_tx, exit_rx) = watch::channel(None);
        spawn_waiter_thread(child_pid, exit_tx);

        Ok(PtyHandle {
            master_fd,
            lifeline_write_fd,
            child_pid,
            output_rx,
            _reader_thread: reader_thread,
            exit_rx,
            closed: false,
        })
    }

    /// Idempotent; on Windows (not implemented here) a race window after
    /// spawn may ignore the first resize, so callers retry after 200ms.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), PtyError> {
        let ws = libc::winsize {
            ws_row: rows.max(1),
            ws_col: cols.max(1),
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        // SAFETY: ws is a fully initialized stack value, master_fd is owned.
        let result = unsafe { libc::ioctl(self.master_fd, libc::TIOCSWINSZ, &ws) };
        if result != 0 {
            return Err(PtyError::ResizeFailed(io::Error::last_os_error()));
        }
        let _ = signal_process_group_or_pid(self.child_pid, libc::SIGWINCH, true);
        Ok(())
    }

    /// Await the next chunk of output, dispatched to the blocking pool so the
    /// cooperative executor is never blocked on the underlying read syscall.
    /// Resolves to `None` (EndOfFile) once the reader thread's sender drops.
    pub async fn read_chunk(&self) -> Option<Vec<u8>> {
        let rx = self.output_rx.clone();
        tokio::task::spawn_blocking(move || rx.recv().ok())
            .await
            .unwrap_or(None)
    }

    pub fn write(&self, bytes: &[u8]) -> Result<usize, PtyError> {
        write_all(self.master_fd, bytes).map_err(PtyError::Io)?;
        Ok(bytes.len())
    }

    /// Completes when the child terminates.
    pub async fn wait(&self) -> ExitStatus {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(status) = *rx.borrow() {
                return ExitStatus::from_raw(status);
            }
            if rx.changed().await.is_err() {
                return ExitStatus::from_raw(0);
            }
        }
    }

    /// Non-blocking peek; does not reap.
    pub fn is_alive(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    pub fn kill_immediate(&self) {
        let _ = signal_process_group_or_pid(self.child_pid, libc::SIGKILL, true);
    }

    /// Runs the escalation ladder from §4.1: SIGINT now, SIGTERM after 5s if
    /// still alive, SIGKILL after a further 5s. Cancels early the moment
    /// `wait()` observes the exit (Soft == Hard semantics do not apply here;
    /// that equivalence is a Windows-only note).
    pub async fn kill(&self, mode: KillMode) {
        if mode == KillMode::HardKill {
            self.kill_immediate();
            return;
        }
        let first_signal = if mode == KillMode::SoftInterrupt { libc::SIGINT } else { libc::SIGTERM };
        let _ = signal_process_group_or_pid(self.child_pid, first_signal, true);

        if self.wait_with_timeout(Duration::from_secs(5)).await {
            return;
        }
        let _ = signal_process_group_or_pid(self.child_pid, libc::SIGTERM, true);
        if self.wait_with_timeout(Duration::from_secs(5)).await {
            return;
        }
        let _ = signal_process_group_or_pid(self.child_pid, libc::SIGKILL, true);
    }

    /// Returns true if the child exited before the timeout elapsed.
    async fn wait_with_timeout(&self, timeout: Duration) -> bool {
        tokio::select! {
            _ = self.wait() => true,
            _ = tokio::time::sleep(timeout) => false,
        }
    }

    /// Release fds. Safe to call more than once; only the first call does
    /// anything. Closing the master fd unblocks any in-flight blocking read,
    /// which resolves as EndOfFile.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // SAFETY: master_fd/lifeline_write_fd are owned exclusively by this handle.
        unsafe {
            close_fd(self.lifeline_write_fd);
            close_fd(self.master_fd);
        }
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn cstr_arg(s: &str) -> Result<CString, PtyError> {
    CString::new(s).map_err(|_| PtyError::SpawnFailed {
        os_error: io::Error::new(io::ErrorKind::InvalidInput, format!("argument contains NUL: {s:?}")),
    })
}

/// Forks and execs a child attached to a freshly allocated pty. Returns the
/// master fd, the write end of a lifeline pipe (closing it signals the
/// watchdog to reap the child group), and the child pid.
///
/// # Safety
/// Caller must eventually close the returned fds. The child side calls
/// `_exit` on any setup failure and never returns across the fork boundary.
unsafe fn spawn_child(
    argv: &[CString],
    cwd: &CString,
    env_overrides: &[(CString, Option<CString>)],
    rows: u16,
    cols: u16,
) -> io::Result<(RawFd, RawFd, i32)> {
    let mut master_fd: RawFd = -1;
    let mut slave_fd: RawFd = -1;
    let mut lifeline_fds = [-1; 2];

    let mut winsize = libc::winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    #[allow(clippy::unnecessary_mut_passed)]
    if libc::openpty(&mut master_fd, &mut slave_fd, ptr::null_mut(), ptr::null_mut(), &mut winsize) != 0 {
        return Err(io::Error::last_os_error());
    }

    if libc::pipe(lifeline_fds.as_mut_ptr()) != 0 {
        close_fd(master_fd);
        close_fd(slave_fd);
        return Err(io::Error::last_os_error());
    }

    set_cloexec(master_fd);
    set_cloexec(slave_fd);
    set_cloexec(lifeline_fds[0]);
    set_cloexec(lifeline_fds[1]);

    let pid = libc::fork();
    if pid < 0 {
        let err = io::Error::last_os_error();
        close_fd(master_fd);
        close_fd(slave_fd);
        close_fd(lifeline_fds[0]);
        close_fd(lifeline_fds[1]);
        return Err(err);
    }

    if pid == 0 {
        close_fd(lifeline_fds[1]);
        child_exec(master_fd, slave_fd, lifeline_fds[0], argv, cwd, env_overrides);
    }

    close_fd(slave_fd);
    close_fd(lifeline_fds[0]);
    Ok((master_fd, lifeline_fds[1], pid))
}

/// # Safety
/// Only valid in the forked child, before any other Rust runtime state
/// (allocator locks, async executors) is assumed initialized. Diverges.
unsafe fn child_exec(
    master_fd: RawFd,
    slave_fd: RawFd,
    lifeline_read_fd: RawFd,
    argv: &[CString],
    cwd: &CString,
    env_overrides: &[(CString, Option<CString>)],
) -> ! {
    let fail = |context: &str| -> ! {
        let err = io::Error::last_os_error();
        let msg = format!("devterm: child_exec {context} failed: {err}\n");
        // SAFETY: write() is async-signal-safe; stderr is valid in the child.
        let _ = libc::write(libc::STDERR_FILENO, msg.as_ptr() as *const libc::c_void, msg.len());
        libc::_exit(1);
    };

    spawn_lifeline_watchdog(lifeline_read_fd);
    close_fd(lifeline_read_fd);
    close_fd(master_fd);

    if libc::setsid() == -1 {
        fail("setsid");
    }
    if libc::ioctl(slave_fd, libc::TIOCSCTTY as libc::c_ulong, 0) == -1 {
        fail("ioctl(TIOCSCTTY)");
    }
    if libc::dup2(slave_fd, libc::STDIN_FILENO) < 0
        || libc::dup2(slave_fd, libc::STDOUT_FILENO) < 0
        || libc::dup2(slave_fd, libc::STDERR_FILENO) < 0
    {
        fail("dup2");
    }
    if slave_fd > libc::STDERR_FILENO {
        close_fd(slave_fd);
    }

    if libc::chdir(cwd.as_ptr()) != 0 {
        fail("chdir");
    }

    for (key, value) in env_overrides {
        match value {
            Some(value) => {
                libc::setenv(key.as_ptr(), value.as_ptr(), 1);
            }
            None => {
                libc::unsetenv(key.as_ptr());
            }
        }
    }

    // Signal dispositions reset to default for the child, per §4.1 ("reset
    // signal dispositions, then exec"). execvp itself resets handlers to
    // SIG_DFL for anything not ignored, but SIGPIPE/SIGINT may have been
    // blocked by the parent; make that explicit.
    libc::signal(libc::SIGINT, libc::SIG_DFL);
    libc::signal(libc::SIGQUIT, libc::SIG_DFL);
    libc::signal(libc::SIGPIPE, libc::SIG_DFL);

    let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|s| s.as_ptr()).collect();
    argv_ptrs.push(ptr::null());
    libc::execvp(argv_ptrs[0], argv_ptrs.as_ptr());
    fail("execvp");
}

/// Forks a watchdog that blocks on the lifeline pipe; when the parent dies
/// and the write end closes, it kills the child's process group so nothing
/// is left behind by a crashed or `kill -9`'d engine.
unsafe fn spawn_lifeline_watchdog(lifeline_read_fd: RawFd) {
    let target_pid = libc::getpid();
    let watchdog_pid = libc::fork();
    if watchdog_pid != 0 {
        return;
    }

    let max_fd = libc::sysconf(libc::_SC_OPEN_MAX);
    let upper = if max_fd > 3 { max_fd as RawFd } else { 1024 };
    for fd in 3..upper {
        if fd != lifeline_read_fd {
            let _ = libc::close(fd);
        }
    }

    let mut byte = [0u8; 1];
    loop {
        let n = libc::read(lifeline_read_fd, byte.as_mut_ptr() as *mut libc::c_void, 1);
        if n == 0 {
            break;
        }
        if n > 0 {
            continue;
        }
        if io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        break;
    }

    let _ = libc::kill(-target_pid, libc::SIGTERM);
    thread::sleep(Duration::from_millis(500));
    let _ = libc::kill(-target_pid, libc::SIGKILL);
    libc::_exit(0);
}

fn spawn_reader_thread(master_fd: RawFd, tx: Sender<Vec<u8>>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            // SAFETY: buf is a valid, appropriately sized, exclusively owned buffer.
            let n = unsafe { libc::read(master_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n > 0 {
                if tx.send(buf[..n as usize].to_vec()).is_err() {
                    return;
                }
                continue;
            }
            if n == 0 {
                return; // EOF: slave side closed.
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(code) if code == libc::EAGAIN || code == libc::EWOULDBLOCK => {
                    thread::sleep(Duration::from_millis(10));
                }
                Some(code) if code == libc::EINTR => continue,
                _ => return, // EIO (slave closed), EBADF (closed from under us), etc.
            }
        }
    })
}

/// Blocks on `waitpid` in a dedicated thread (this is the one legitimate
/// blocking wait site; everything above it is async) and publishes the raw
/// status once, so any number of `wait()` callers can observe it via the
/// `watch` channel without re-reaping.
fn spawn_waiter_thread(child_pid: i32, tx: watch::Sender<Option<i32>>) {
    thread::spawn(move || {
        let mut status = 0;
        // SAFETY: child_pid was returned by fork() above and is owned by this handle.
        let ret = unsafe { libc::waitpid(child_pid, &mut status, 0) };
        let _ = tx.send(Some(if ret > 0 { status } else { 0 }));
    });
}

unsafe fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = libc::fcntl(fd, libc::F_GETFL, 0);
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_cloexec(fd: RawFd) {
    if fd < 0 {
        return;
    }
    // SAFETY: fd is a valid descriptor owned by the caller at this point.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
}

unsafe fn close_fd(fd: RawFd) {
    if fd >= 0 {
        let _ = libc::close(fd);
    }
}

fn write_all(fd: RawFd, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        // SAFETY: bytes is a valid slice for its own length; fd is owned by the caller.
        let n = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        if n > 0 {
            bytes = &bytes[n as usize..];
            continue;
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EAGAIN || code == libc::EWOULDBLOCK => {
                thread::sleep(Duration::from_millis(5));
            }
            Some(code) if code == libc::EINTR => continue,
            _ => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_spec<'a>(program: &'a str, args: &'a [String]) -> SpawnSpec<'a> {
        SpawnSpec { program, args, env: &[], cwd: None, rows: 24, cols: 80 }
    }

    #[test]
    fn bad_size_is_rejected() {
        let args: Vec<String> = Vec::new();
        let spec = SpawnSpec { program: "true", args: &args, env: &[], cwd: None, rows: 0, cols: 80 };
        let err = PtyHandle::spawn(spec).unwrap_err();
        assert!(matches!(err, PtyError::BadSize { .. }));
    }

    #[tokio::test]
    async fn spawn_printf_produces_expected_output() {
        let args = vec!["hi\\n".to_string()];
        let handle = PtyHandle::spawn(spawn_spec("printf", &args)).expect("spawn printf");
        let mut collected = Vec::new();
        while let Some(chunk) = handle.read_chunk().await {
            collected.extend(chunk);
            if collected.contains(&b'\n') {
                break;
            }
        }
        assert!(String::from_utf8_lossy(&collected).contains("hi"));
        handle.wait().await;
    }

    #[tokio::test]
    async fn false_exits_nonzero() {
        let args: Vec<String> = Vec::new();
        let handle = PtyHandle::spawn(spawn_spec("false", &args)).expect("spawn false");
        let status = handle.wait().await;
        assert_ne!(status.code(), Some(0));
    }

    #[tokio::test]
    async fn hard_kill_terminates_sleep_quickly() {
        let args = vec!["30".to_string()];
        let handle = PtyHandle::spawn(spawn_spec("sleep", &args)).expect("spawn sleep");
        handle.kill(KillMode::HardKill).await;
        let start = std::time::Instant::now();
        handle.wait().await;
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn resize_is_idempotent_and_does_not_error() {
        let args = vec!["5".to_string()];
        let handle = PtyHandle::spawn(spawn_spec("sleep", &args)).expect("spawn sleep");
        handle.resize(40, 100).expect("first resize");
        handle.resize(40, 100).expect("second resize");
        handle.kill(KillMode::HardKill).await;
    }
}

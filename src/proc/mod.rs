//! Process supervisor (C3): one `Proc` per declared process, owning either
//! a PTY+VT pair ("vterm" kind) or a line-buffered pipe pair ("simple"
//! kind), exposing the state machine and input API from §4.3.

pub mod simple;
pub mod subscribers;
pub mod vterm_kind;

use crate::config::{ProcessDecl, StopMode};
use crate::keymap::{self, KeyEvent};
use crate::pty::{KillMode, PtyHandle, SpawnSpec};
use simple::SimpleKind;
pub use subscribers::{Subscribers, Subscription};
use subscribers::SubscriptionGroup;
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use vterm_kind::VtermKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Stopped,
    Running,
    Stopping,
}

/// Notifications a spawned reader/waiter task sends back to the single
/// engine task that owns all `Proc` state. `index` ties the message back to
/// the originating proc in the engine's fixed-after-start array.
pub enum EngineMsg {
    Data { index: usize, bytes: Vec<u8> },
    Closed { index: usize },
    Exited { index: usize, status: ExitStatus },
}

enum Kind {
    Vterm(VtermKind),
    Simple(SimpleKind),
}

pub struct Proc {
    index: usize,
    pub name: String,
    decl: ProcessDecl,
    state: State,
    size: (u16, u16),
    kind: Option<Kind>,
    group: SubscriptionGroup,
    pub on_state_change: Subscribers<State>,
    pub on_rerender: Subscribers<()>,
    started_at: Option<Instant>,
    exit_status: Option<ExitStatus>,
    pending_restart: bool,
    /// Set once an autorestart has already fired for an exit that happened
    /// before `started_at` reached 1s; cleared the next time the proc
    /// survives that long. Lets the *first* crash always autorestart while
    /// still breaking an infinite crash loop on the next one (§4.3, §8
    /// scenario 6; see DESIGN.md's Open Question on this).
    fast_restart_used: bool,
    tx: mpsc::Sender<EngineMsg>,
}

impl Proc {
    pub fn new(index: usize, decl: ProcessDecl, size: (u16, u16), tx: mpsc::Sender<EngineMsg>) -> Self {
        Proc {
            index,
            name: decl.name.clone(),
            decl,
            state: State::Stopped,
            size,
            kind: None,
            group: SubscriptionGroup::new(),
            on_state_change: Subscribers::new(),
            on_rerender: Subscribers::new(),
            started_at: None,
            exit_status: None,
            pending_restart: false,
            fast_restart_used: false,
            tx,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn decl(&self) -> &ProcessDecl {
        &self.decl
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn is_vterm(&self) -> bool {
        matches!(self.kind, Some(Kind::Vterm(_)))
    }

    pub fn vterm(&self) -> Option<&vterm_kind::VtermKind> {
        match &self.kind {
            Some(Kind::Vterm(v)) => Some(v),
            _ => None,
        }
    }

    pub fn simple(&self) -> Option<&SimpleKind> {
        match &self.kind {
            Some(Kind::Simple(s)) => Some(s),
            _ => None,
        }
    }

    fn set_state(&mut self, state: State) {
        self.state = state;
        self.on_state_change.fire(&state);
    }

    fn set_rerender(&mut self) {
        self.on_rerender.fire(&());
    }

    /// `start()` on non-Stopped is a no-op.
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.state != State::Stopped {
            return Ok(());
        }
        self.group.clear();
        self.exit_status = None;

        let (program, args) = self.decl.program_and_args();
        let (rows, cols) = self.size;

        if self.decl.tty {
            match self.spawn_vterm(&program, &args, rows, cols) {
                Ok(kind) => self.kind = Some(Kind::Vterm(kind)),
                Err(err) => {
                    tracing::warn!(proc = %self.name, %err, "spawn failed");
                    self.started_at = Some(Instant::now());
                    self.exit_status = Some(synthetic_nonzero_exit());
                    self.set_state(State::Stopped);
                    return Ok(());
                }
            }
        } else {
            match self.spawn_simple(&program, &args) {
                Ok(kind) => self.kind = Some(Kind::Simple(kind)),
                Err(err) => {
                    tracing::warn!(proc = %self.name, %err, "spawn failed");
                    self.started_at = Some(Instant::now());
                    self.exit_status = Some(synthetic_nonzero_exit());
                    self.set_state(State::Stopped);
                    return Ok(());
                }
            }
        }

        self.started_at = Some(Instant::now());
        self.set_state(State::Running);
        Ok(())
    }

    fn spawn_vterm(&mut self, program: &str, args: &[String], rows: u16, cols: u16) -> anyhow::Result<VtermKind> {
        let spec = SpawnSpec {
            program,
            args,
            env: &self.decl.env,
            cwd: self.decl.cwd.as_deref(),
            rows,
            cols,
        };
        let handle = PtyHandle::spawn(spec)?;
        let kind = VtermKind::new(handle, rows as usize, cols as usize);

        let index = self.index;
        let tx = self.tx.clone();
        let reader_handle = kind.handle.clone();
        tokio::spawn(async move {
            loop {
                match reader_handle.read_chunk().await {
                    Some(bytes) => {
                        if tx.send(EngineMsg::Data { index, bytes }).await.is_err() {
                            return;
                        }
                    }
                    None => {
                        let _ = tx.send(EngineMsg::Closed { index }).await;
                        return;
                    }
                }
            }
        });

        let index = self.index;
        let tx = self.tx.clone();
        let wait_handle = kind.handle.clone();
        tokio::spawn(async move {
            let status = wait_handle.wait().await;
            let _ = tx.send(EngineMsg::Exited { index, status }).await;
        });

        Ok(kind)
    }

    fn spawn_simple(&mut self, program: &str, args: &[String]) -> anyhow::Result<SimpleKind> {
        use std::process::Stdio;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.decl.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.decl.env {
            match value {
                Some(v) => {
                    cmd.env(key, v);
                }
                None => {
                    cmd.env_remove(key);
                }
            }
        }

        let mut child = cmd.spawn()?;
        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let index = self.index;
        if let Some(stdout) = stdout {
            let tx = self.tx.clone();
            spawn_byte_reader(index, stdout, tx);
        }
        if let Some(stderr) = stderr {
            let tx = self.tx.clone();
            spawn_byte_reader(index, stderr, tx);
        }

        // The waiter task owns `child` from here on; `SimpleKind` keeps only
        // the pid it already captured, for `stop()`/`force_stop()` signals.
        let index = self.index;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let _ = tx.send(EngineMsg::Exited { index, status }).await;
                }
                Err(err) => {
                    tracing::warn!(%err, "wait() failed for simple-kind child");
                    let _ = tx.send(EngineMsg::Exited { index, status: synthetic_nonzero_exit() }).await;
                }
            }
        });

        Ok(SimpleKind::new(pid, stdin))
    }

    /// Graceful stop per `decl.stop`: Running -> Stopping, no-op otherwise.
    pub fn stop(&mut self) {
        if self.state != State::Running {
            return;
        }
        self.set_state(State::Stopping);
        match &mut self.kind {
            Some(Kind::Vterm(v)) => {
                let handle = v.handle.clone();
                match self.decl.stop.clone() {
                    StopMode::SendKeys(specs) => {
                        for spec in &specs {
                            if let Some(ev) = keymap::parse_key_spec(spec) {
                                let _ = handle.write(&keymap::encode_vterm(ev));
                            }
                        }
                        tokio::spawn(async move {
                            handle.kill(KillMode::SoftTerminate).await;
                        });
                    }
                    other => {
                        let mode = kill_mode_for(&other);
                        tokio::spawn(async move {
                            handle.kill(mode).await;
                        });
                    }
                }
            }
            Some(Kind::Simple(s)) => {
                if let Some(pid) = s.pid {
                    let signal = signal_for(&self.decl.stop);
                    let _ = crate::process_signal::signal_process_group_or_pid(pid as i32, signal, true);
                }
            }
            None => {}
        }
    }

    /// Immediate kill, issuable from Running or Stopping.
    pub fn force_stop(&mut self) {
        if !matches!(self.state, State::Running | State::Stopping) {
            return;
        }
        self.set_state(State::Stopping);
        match &self.kind {
            Some(Kind::Vterm(v)) => {
                let handle = v.handle.clone();
                tokio::spawn(async move {
                    handle.kill(KillMode::HardKill).await;
                });
            }
            Some(Kind::Simple(s)) => {
                if let Some(pid) = s.pid {
                    let _ = crate::process_signal::signal_process_group_or_pid(pid as i32, libc::SIGKILL, true);
                }
            }
            None => {}
        }
    }

    /// `restart(mode)`: stop (or force-stop), then start once Stopped is
    /// observed. If already Stopped, starts immediately.
    pub fn restart(&mut self, force: bool) {
        match self.state {
            State::Stopped => {
                let _ = self.start();
            }
            State::Running | State::Stopping => {
                self.pending_restart = true;
                if force {
                    self.force_stop();
                } else {
                    self.stop();
                }
            }
        }
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.size = (rows, cols);
        if let Some(Kind::Vterm(v)) = &mut self.kind {
            if let Err(err) = v.handle.resize(rows, cols) {
                tracing::warn!(proc = %self.name, %err, "pty resize failed");
            }
            v.term.set_size(rows as usize, cols as usize);
        }
    }

    /// Forwards to the encoder then to the child; discards while Stopped.
    pub async fn send_input(&mut self, ev: KeyEvent) {
        if self.state == State::Stopped {
            return;
        }
        match &mut self.kind {
            Some(Kind::Vterm(v)) => {
                let bytes = keymap::encode_vterm(ev);
                let _ = v.handle.write(&bytes);
            }
            Some(Kind::Simple(s)) => {
                if let Some(bytes) = keymap::encode_simple(ev) {
                    if let Some(stdin) = s.stdin.as_mut() {
                        let _ = stdin.write_all(&bytes).await;
                    }
                }
            }
            None => {}
        }
    }

    /// Route a `Data` message for this proc: feed the kind and fan out to
    /// `on_rerender` only if the mutation actually produced damage/a
    /// completed line.
    pub fn handle_data(&mut self, bytes: &[u8]) {
        let needs_render = match &mut self.kind {
            Some(Kind::Vterm(v)) => {
                v.feed(bytes);
                v.take_damaged()
            }
            Some(Kind::Simple(s)) => s.append_bytes(bytes),
            None => false,
        };
        if needs_render {
            self.set_rerender();
        }
    }

    pub fn handle_closed(&mut self) {
        // Reader EOF precedes the real wait() exit status; nothing to do
        // until `handle_exit` supplies the authoritative status.
    }

    pub fn handle_exit(&mut self, status: ExitStatus) {
        let was_running = self.state == State::Running;
        self.group.clear();
        self.kind = None;
        self.exit_status = Some(status);
        self.set_state(State::Stopped);

        let alive_long_enough = self
            .started_at
            .map(|t| t.elapsed() >= Duration::from_secs(1))
            .unwrap_or(false);

        if self.pending_restart {
            self.pending_restart = false;
            self.fast_restart_used = false;
            let _ = self.start();
        } else if was_running && self.decl.autorestart {
            if alive_long_enough {
                self.fast_restart_used = false;
                let _ = self.start();
            } else if !self.fast_restart_used {
                // First crash, however fast: always autorestart once.
                self.fast_restart_used = true;
                let _ = self.start();
            }
            // Else: this is already the second consecutive fast exit in a
            // row, a crash loop. Stay Stopped rather than spin forever.
        }
    }
}

fn spawn_byte_reader(index: usize, mut reader: impl tokio::io::AsyncRead + Unpin + Send + 'static, tx: mpsc::Sender<EngineMsg>) {
    use tokio::io::AsyncReadExt;
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => {
                    let _ = tx.send(EngineMsg::Closed { index }).await;
                    return;
                }
                Ok(n) => {
                    if tx.send(EngineMsg::Data { index, bytes: buf[..n].to_vec() }).await.is_err() {
                        return;
                    }
                }
            }
        }
    });
}

fn kill_mode_for(stop: &StopMode) -> KillMode {
    match stop {
        StopMode::Sigint => KillMode::SoftInterrupt,
        StopMode::Sigterm => KillMode::SoftTerminate,
        StopMode::Sigkill | StopMode::HardKill => KillMode::HardKill,
        StopMode::SendKeys(_) => KillMode::SoftTerminate,
    }
}

fn signal_for(stop: &StopMode) -> i32 {
    match stop {
        StopMode::Sigint => libc::SIGINT,
        StopMode::Sigterm => libc::SIGTERM,
        StopMode::Sigkill | StopMode::HardKill => libc::SIGKILL,
        StopMode::SendKeys(_) => libc::SIGTERM,
    }
}

#[cfg(not(unix))]
fn synthetic_nonzero_exit() -> ExitStatus {
    std::process::Command::new("cmd").arg("/c").arg("exit 1").status().unwrap()
}

#[cfg(unix)]
fn synthetic_nonzero_exit() -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(1 << 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Command as DeclCommand, ProcessDecl, StopMode};

    fn decl(name: &str, command: DeclCommand, tty: bool) -> ProcessDecl {
        ProcessDecl {
            name: name.to_string(),
            command,
            env: vec![],
            cwd: None,
            tty,
            autostart: true,
            autorestart: false,
            stop: StopMode::default(),
        }
    }

    fn autorestart_decl(name: &str) -> ProcessDecl {
        ProcessDecl { autorestart: true, ..decl(name, DeclCommand::Shell("false".into()), false) }
    }

    #[tokio::test]
    async fn start_on_non_stopped_is_a_no_op() {
        let (tx, _rx) = mpsc::channel(16);
        let mut proc = Proc::new(0, decl("a", DeclCommand::Shell("true".into()), false), (24, 80), tx);
        proc.start().unwrap();
        assert_eq!(proc.state(), State::Running);
        proc.start().unwrap();
        assert_eq!(proc.state(), State::Running);
    }

    #[tokio::test]
    async fn stop_on_stopped_is_a_no_op() {
        let (tx, _rx) = mpsc::channel(16);
        let mut proc = Proc::new(0, decl("a", DeclCommand::Shell("true".into()), false), (24, 80), tx);
        assert_eq!(proc.state(), State::Stopped);
        proc.stop();
        assert_eq!(proc.state(), State::Stopped);
    }

    #[tokio::test]
    async fn handle_exit_transitions_to_stopped_and_fires_listener() {
        let (tx, _rx) = mpsc::channel(16);
        let mut proc = Proc::new(0, decl("a", DeclCommand::Shell("true".into()), false), (24, 80), tx);
        proc.start().unwrap();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let _sub = proc.on_state_change.subscribe(move |s| seen2.lock().unwrap().push(*s));
        proc.handle_exit(synthetic_nonzero_exit());
        assert_eq!(proc.state(), State::Stopped);
        assert_eq!(*seen.lock().unwrap(), vec![State::Stopped]);
    }

    #[tokio::test]
    async fn kind_absent_iff_stopped() {
        let (tx, _rx) = mpsc::channel(16);
        let mut proc = Proc::new(0, decl("a", DeclCommand::Shell("true".into()), false), (24, 80), tx);
        assert!(proc.kind.is_none());
        proc.start().unwrap();
        assert!(proc.kind.is_some());
        proc.handle_exit(synthetic_nonzero_exit());
        assert!(proc.kind.is_none());
    }

    /// §8 scenario 6: an immediately-failing autorestart proc observes two
    /// consecutive `Stopped` transitions with a `Running` phase between,
    /// even though it never stays alive 1s.
    #[tokio::test]
    async fn autorestart_fires_on_the_first_fast_exit() {
        let (tx, _rx) = mpsc::channel(16);
        let mut proc = Proc::new(0, autorestart_decl("a"), (24, 80), tx);
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let _sub = proc.on_state_change.subscribe(move |s| seen2.lock().unwrap().push(*s));
        proc.start().unwrap();
        proc.handle_exit(synthetic_nonzero_exit());
        assert_eq!(proc.state(), State::Running);
        assert_eq!(*seen.lock().unwrap(), vec![State::Running, State::Stopped, State::Running]);
    }

    #[tokio::test]
    async fn autorestart_stops_after_a_second_consecutive_fast_exit() {
        let (tx, _rx) = mpsc::channel(16);
        let mut proc = Proc::new(0, autorestart_decl("a"), (24, 80), tx);
        proc.start().unwrap();
        proc.handle_exit(synthetic_nonzero_exit());
        assert_eq!(proc.state(), State::Running);
        proc.handle_exit(synthetic_nonzero_exit());
        assert_eq!(proc.state(), State::Stopped);
    }

    #[tokio::test]
    async fn autorestart_fires_again_after_surviving_a_full_second() {
        let (tx, _rx) = mpsc::channel(16);
        let mut proc = Proc::new(0, autorestart_decl("a"), (24, 80), tx);
        proc.start().unwrap();
        proc.handle_exit(synthetic_nonzero_exit());
        assert_eq!(proc.state(), State::Running);
        proc.started_at = Some(Instant::now() - Duration::from_secs(2));
        proc.handle_exit(synthetic_nonzero_exit());
        assert_eq!(proc.state(), State::Running);
    }
}

//! Engine / lifecycle (C7): owns the fixed-after-start process array,
//! orchestrates start-all/stop-all/resize-all, and drives the single
//! cooperative run loop that ties the render scheduler, the input
//! dispatcher, and the remote-control channel together.

use crate::config::ProcessDecl;
use crate::keymap::{self, InputEvent};
use crate::proc::{subscribers::Subscription, EngineMsg, Proc, State};
use crate::remote::RemoteCommand;
use crate::render::RenderScheduler;
use crate::ui::{self, Action, Dispatch, Focus, Keymap, UiState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything the painter (C8) needs to read for one frame; kept separate
/// from `Engine` so the render call site doesn't need a `&mut Engine`.
pub struct EngineView<'a> {
    pub procs: &'a [Proc],
    pub ui: &'a UiState,
    pub keymap_procs: &'a Keymap,
    pub keymap_term: &'a Keymap,
}

pub struct Engine {
    procs: Vec<Proc>,
    render: Arc<RenderScheduler>,
    ui: UiState,
    selected_shared: Arc<AtomicUsize>,
    msg_rx: mpsc::Receiver<EngineMsg>,
    keymap_procs: Keymap,
    keymap_term: Keymap,
    // Kept alive for the engine's lifetime: dropping one of these would
    // unsubscribe it, per the `Subscribers`/`Subscription` contract (§9).
    _rerender_subs: Vec<Subscription<()>>,
    quitting: bool,
}

impl Engine {
    pub fn new(decls: Vec<ProcessDecl>, term_size: (u16, u16)) -> Self {
        let (tx, msg_rx) = mpsc::channel(1024);
        let render = Arc::new(RenderScheduler::new());
        let selected_shared = Arc::new(AtomicUsize::new(0));

        let mut procs = Vec::with_capacity(decls.len());
        let mut rerender_subs = Vec::with_capacity(decls.len());
        for (index, decl) in decls.into_iter().enumerate() {
            let mut proc = Proc::new(index, decl, term_size, tx.clone());
            let render_for_sub = render.clone();
            let selected_for_sub = selected_shared.clone();
            // §4.7: "attach a listener to its on_rerender that, only if the
            // proc is the selected one, calls the render scheduler."
            let sub = proc.on_rerender.subscribe(move |_| {
                if selected_for_sub.load(Ordering::SeqCst) == index {
                    render_for_sub.schedule();
                }
            });
            rerender_subs.push(sub);
            procs.push(proc);
        }

        let ui = UiState::new(procs.len(), term_size);

        Engine {
            procs,
            render,
            ui,
            selected_shared,
            msg_rx,
            keymap_procs: ui::default_keymap_procs(),
            keymap_term: ui::default_keymap_term(),
            _rerender_subs: rerender_subs,
            quitting: false,
        }
    }

    pub fn render_scheduler(&self) -> Arc<RenderScheduler> {
        self.render.clone()
    }

    pub fn view(&self) -> EngineView<'_> {
        EngineView {
            procs: &self.procs,
            ui: &self.ui,
            keymap_procs: &self.keymap_procs,
            keymap_term: &self.keymap_term,
        }
    }

    /// Starts every declared proc with `autostart: true`. Spawn failures are
    /// not fatal (§7): a failed proc simply stays/returns to Stopped with a
    /// synthetic exit status, visible as a DOWN badge.
    pub fn start_all(&mut self) {
        for proc in &mut self.procs {
            if proc.decl().autostart {
                let _ = proc.start();
            }
        }
        self.render.schedule();
    }

    pub fn resize_all(&mut self, rows: u16, cols: u16) {
        self.ui.term_size = (rows, cols);
        for proc in &mut self.procs {
            proc.resize(rows, cols);
        }
        self.render.schedule();
    }

    /// Issues `stop()` on every proc. The run loop keeps draining
    /// `EngineMsg`s until every proc has observed its `Stopped` transition,
    /// which stands in for "await all `stopped` completions in parallel" in
    /// this single-executor design (§4.7).
    pub fn begin_quit(&mut self) {
        self.quitting = true;
        for proc in &mut self.procs {
            proc.stop();
        }
        self.render.schedule();
    }

    pub fn begin_force_quit(&mut self) {
        self.quitting = true;
        for proc in &mut self.procs {
            proc.force_stop();
        }
        self.render.schedule();
    }

    pub fn all_stopped(&self) -> bool {
        self.procs.iter().all(|p| p.state() == State::Stopped)
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    fn set_selected(&mut self, index: usize) {
        self.ui.select(index);
        self.selected_shared.store(self.ui.selected, Ordering::SeqCst);
    }

    fn move_selection(&mut self, forward: bool) {
        if forward {
            self.ui.next();
        } else {
            self.ui.prev();
        }
        self.selected_shared.store(self.ui.selected, Ordering::SeqCst);
    }

    fn selected_proc_mut(&mut self) -> Option<&mut Proc> {
        self.procs.get_mut(self.ui.selected)
    }

    /// The selected process's available scrollback history, the bound
    /// `UiState::scroll_up` clamps against (§4.8: vterm scrollback for
    /// tty processes, the completed-line deque for pipe-buffered ones).
    fn selected_history_len(&self) -> usize {
        match self.procs.get(self.ui.selected) {
            Some(proc) => proc
                .vterm()
                .map(|v| v.term.scrollback().len())
                .or_else(|| proc.simple().map(|s| s.line_count()))
                .unwrap_or(0),
            None => 0,
        }
    }

    fn scroll_up(&mut self, n: usize) {
        let max = self.selected_history_len();
        self.ui.scroll_up(n, max);
    }

    fn scroll_down(&mut self, n: usize) {
        self.ui.scroll_down(n);
    }

    async fn apply_action(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => {
                self.begin_quit();
                return true;
            }
            Action::SelectNext => self.move_selection(true),
            Action::SelectPrev => self.move_selection(false),
            Action::SelectIndex(i) => self.set_selected(i),
            Action::KillProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.stop();
                }
            }
            Action::StartProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    let _ = proc.start();
                }
            }
            Action::RestartProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.restart(false);
                }
            }
            Action::ForceRestartProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.restart(true);
                }
            }
            Action::FocusTerm => self.ui.focus = Focus::Term,
            Action::FocusProcs => self.ui.focus = Focus::Procs,
            Action::ScrollUp(n) => self.scroll_up(n),
            Action::ScrollDown(n) => self.scroll_down(n),
        }
        self.render.schedule();
        false
    }

    /// Handles one input event from the host terminal (§4.6's dispatch).
    /// Returns `true` if this input should begin the quit sequence.
    pub async fn handle_input(&mut self, event: InputEvent) -> bool {
        match ui::dispatch(&self.ui, event, &self.keymap_procs, &self.keymap_term) {
            Dispatch::Action(action) => self.apply_action(action).await,
            Dispatch::Forward(ev) => {
                if let Some(proc) = self.procs.get_mut(self.ui.selected) {
                    proc.send_input(ev).await;
                }
                false
            }
            Dispatch::Resize(rows, cols) => {
                self.resize_all(rows, cols);
                false
            }
            Dispatch::None => false,
        }
    }

    /// Applies one parsed remote-control command (§6), recursing once per
    /// level for `batch`. Returns `true` if this command should begin the
    /// quit sequence.
    pub async fn handle_remote_command(&mut self, cmd: RemoteCommand) -> bool {
        match cmd {
            RemoteCommand::Quit => {
                self.begin_quit();
                return true;
            }
            RemoteCommand::ForceQuit => {
                self.begin_force_quit();
                return true;
            }
            RemoteCommand::ToggleFocus => self.ui.toggle_focus(),
            RemoteCommand::FocusProcs => self.ui.focus = Focus::Procs,
            RemoteCommand::FocusTerm => self.ui.focus = Focus::Term,
            RemoteCommand::NextProc => self.move_selection(true),
            RemoteCommand::PrevProc => self.move_selection(false),
            RemoteCommand::SelectProc { index } => self.set_selected(index),
            RemoteCommand::StartProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    let _ = proc.start();
                }
            }
            RemoteCommand::TermProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.stop();
                }
            }
            RemoteCommand::KillProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.force_stop();
                }
            }
            RemoteCommand::RestartProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.restart(false);
                }
            }
            RemoteCommand::ForceRestartProc => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.restart(true);
                }
            }
            RemoteCommand::AddProc { .. } | RemoteCommand::RemoveProc { .. } => {
                // §4.7: "the engine's array of procs is fixed after start."
                // Quantity-changing commands are recognised (so `batch`
                // parsing never fails) but rejected at apply time; see
                // DESIGN.md's Open Question (b) resolution.
                tracing::warn!("add-proc/remove-proc rejected: process array is fixed after start");
            }
            RemoteCommand::RenameProc { name } => {
                if let Some(proc) = self.selected_proc_mut() {
                    proc.name = name;
                }
            }
            RemoteCommand::ScrollUp => self.scroll_up(1),
            RemoteCommand::ScrollDown => self.scroll_down(1),
            RemoteCommand::ScrollDownLines { n } => self.scroll_down(n),
            RemoteCommand::SendKey { key } => {
                if let Some(ev) = keymap::parse_key_spec(&key) {
                    if let Some(proc) = self.selected_proc_mut() {
                        proc.send_input(ev).await;
                    }
                }
            }
            RemoteCommand::Batch { cmds } => {
                for cmd in cmds {
                    if Box::pin(self.handle_remote_command(cmd)).await {
                        return true;
                    }
                }
            }
        }
        self.render.schedule();
        false
    }

    pub fn handle_engine_msg(&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::Data { index, bytes } => {
                if let Some(proc) = self.procs.get_mut(index) {
                    proc.handle_data(&bytes);
                }
            }
            EngineMsg::Closed { index } => {
                if let Some(proc) = self.procs.get_mut(index) {
                    proc.handle_closed();
                }
            }
            EngineMsg::Exited { index, status } => {
                if let Some(proc) = self.procs.get_mut(index) {
                    proc.handle_exit(status);
                }
                self.render.schedule();
            }
        }
    }

    pub async fn recv_msg(&mut self) -> Option<EngineMsg> {
        self.msg_rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Command as DeclCommand, ProcessDecl, StopMode};

    fn decl(name: &str) -> ProcessDecl {
        ProcessDecl {
            name: name.to_string(),
            command: DeclCommand::Shell("true".into()),
            env: vec![],
            cwd: None,
            tty: false,
            autostart: true,
            autorestart: false,
            stop: StopMode::default(),
        }
    }

    #[test]
    fn new_engine_has_one_proc_per_decl() {
        let engine = Engine::new(vec![decl("a"), decl("b")], (24, 80));
        assert_eq!(engine.view().procs.len(), 2);
    }

    #[tokio::test]
    async fn start_all_transitions_autostart_procs_to_running() {
        let mut engine = Engine::new(vec![decl("a")], (24, 80));
        engine.start_all();
        assert_eq!(engine.view().procs[0].state(), State::Running);
    }

    #[tokio::test]
    async fn select_index_action_updates_ui_and_shared_index() {
        let mut engine = Engine::new(vec![decl("a"), decl("b"), decl("c")], (24, 80));
        let handled = engine.apply_action(Action::SelectIndex(2)).await;
        assert!(!handled);
        assert_eq!(engine.view().ui.selected, 2);
        assert_eq!(engine.selected_shared.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn quit_action_reports_should_quit() {
        let mut engine = Engine::new(vec![decl("a")], (24, 80));
        assert!(engine.apply_action(Action::Quit).await);
        assert!(engine.is_quitting());
    }

    #[tokio::test]
    async fn begin_quit_then_drain_reaches_all_stopped() {
        let mut engine = Engine::new(vec![decl("a")], (24, 80));
        engine.start_all();
        engine.begin_quit();
        for _ in 0..50 {
            if engine.all_stopped() {
                break;
            }
            if let Some(msg) = engine.recv_msg().await {
                engine.handle_engine_msg(msg);
            }
        }
        assert!(engine.all_stopped());
    }

    #[tokio::test]
    async fn rename_proc_updates_selected_proc_name() {
        let mut engine = Engine::new(vec![decl("a")], (24, 80));
        engine
            .handle_remote_command(RemoteCommand::RenameProc { name: "renamed".into() })
            .await;
        assert_eq!(engine.view().procs[0].name, "renamed");
    }

    #[tokio::test]
    async fn add_proc_is_rejected_without_changing_proc_count() {
        let mut engine = Engine::new(vec![decl("a")], (24, 80));
        engine
            .handle_remote_command(RemoteCommand::AddProc { cmd: vec!["true".into()], name: None })
            .await;
        assert_eq!(engine.view().procs.len(), 1);
    }
}

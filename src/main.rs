//! `devterm` entrypoint: parses the CLI surface (§6), loads the declared
//! process list, sets up the host terminal, and drives the engine's run
//! loop until quit.

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::event::{Event as CtEvent, KeyEventKind};
use devterm::config::{self, Command as DeclCommand, ProcessDecl, StopMode};
use devterm::engine::Engine;
use devterm::keymap::{InputEvent, KeyCode, KeyEvent as DtKeyEvent, Modifiers, MouseEvent, MouseEventKind};
use devterm::logging;
use devterm::painter;
use devterm::remote::{self, ListenAddr, RemoteCommand};
use devterm::sigwinch;
use devterm::terminal_restore::TerminalRestoreGuard;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// A terminal multiplexer for development workflows: runs several declared
/// processes side by side, each in its own virtual terminal.
#[derive(Parser, Debug)]
#[command(name = "devterm", version, about)]
struct Cli {
    /// Ad-hoc command to run in place of (or alongside) `--config`/`--npm`.
    #[arg(trailing_var_arg = true)]
    cmd: Vec<String>,

    /// Load process declarations from a JSON or YAML file.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only autostart these comma-separated declared process names.
    #[arg(long = "names", value_delimiter = ',')]
    names: Vec<String>,

    /// Load process declarations from `package.json`'s `scripts` map.
    #[arg(long = "npm")]
    npm: bool,

    /// Listen for remote control commands on this Unix socket path or TCP address.
    #[arg(long = "server", value_name = "ADDR")]
    server: Option<String>,

    /// Send one remote control command (as a YAML document) to `--server` and exit.
    #[arg(long = "ctl", value_name = "YAML")]
    ctl: Option<String>,
}

fn ad_hoc_decl(cmd: &[String]) -> ProcessDecl {
    let program = cmd[0].clone();
    let args = cmd[1..].to_vec();
    ProcessDecl {
        name: program.clone(),
        command: DeclCommand::Program { program, args },
        env: Vec::new(),
        cwd: None,
        tty: true,
        autostart: true,
        autorestart: false,
        stop: StopMode::default(),
    }
}

fn load_decls(cli: &Cli) -> Result<Vec<ProcessDecl>> {
    let mut decls = Vec::new();

    if cli.npm {
        let path = cli.config.clone().unwrap_or_else(|| PathBuf::from("package.json"));
        decls.extend(config::load_npm(&path).context("loading package.json scripts")?);
    } else if let Some(path) = &cli.config {
        decls.extend(config::load(path).context("loading config")?);
    }

    if !cli.cmd.is_empty() {
        decls.push(ad_hoc_decl(&cli.cmd));
    }

    if decls.is_empty() {
        bail!("nothing to run: pass a command, --config, or --npm");
    }

    config::apply_name_filter(&mut decls, &cli.names)?;
    Ok(decls)
}

fn convert_crossterm_event(event: CtEvent) -> Option<InputEvent> {
    match event {
        CtEvent::Key(key) => {
            if key.kind == KeyEventKind::Release {
                return None;
            }
            let code = match key.code {
                crossterm::event::KeyCode::Char(c) => KeyCode::Char(c),
                crossterm::event::KeyCode::Backspace => KeyCode::Backspace,
                crossterm::event::KeyCode::Enter => KeyCode::Enter,
                crossterm::event::KeyCode::Tab => KeyCode::Tab,
                crossterm::event::KeyCode::BackTab => KeyCode::BackTab,
                crossterm::event::KeyCode::Esc => KeyCode::Escape,
                crossterm::event::KeyCode::Delete => KeyCode::Delete,
                crossterm::event::KeyCode::Insert => KeyCode::Insert,
                crossterm::event::KeyCode::Home => KeyCode::Home,
                crossterm::event::KeyCode::End => KeyCode::End,
                crossterm::event::KeyCode::PageUp => KeyCode::PageUp,
                crossterm::event::KeyCode::PageDown => KeyCode::PageDown,
                crossterm::event::KeyCode::Up => KeyCode::Up,
                crossterm::event::KeyCode::Down => KeyCode::Down,
                crossterm::event::KeyCode::Left => KeyCode::Left,
                crossterm::event::KeyCode::Right => KeyCode::Right,
                crossterm::event::KeyCode::F(n) => KeyCode::F(n),
                crossterm::event::KeyCode::Null => KeyCode::Null,
                _ => return None,
            };
            let mods = Modifiers {
                ctrl: key.modifiers.contains(crossterm::event::KeyModifiers::CONTROL),
                shift: key.modifiers.contains(crossterm::event::KeyModifiers::SHIFT),
                alt: key.modifiers.contains(crossterm::event::KeyModifiers::ALT),
            };
            Some(InputEvent::Key(DtKeyEvent::new(code, mods)))
        }
        CtEvent::Mouse(m) => {
            let kind = match m.kind {
                crossterm::event::MouseEventKind::Down(_) => MouseEventKind::Down,
                crossterm::event::MouseEventKind::Up(_) => MouseEventKind::Up,
                crossterm::event::MouseEventKind::Drag(_) => MouseEventKind::Drag,
                crossterm::event::MouseEventKind::Moved => MouseEventKind::Moved,
                crossterm::event::MouseEventKind::ScrollUp => MouseEventKind::ScrollUp,
                crossterm::event::MouseEventKind::ScrollDown => MouseEventKind::ScrollDown,
                _ => return None,
            };
            let mods = Modifiers {
                ctrl: m.modifiers.contains(crossterm::event::KeyModifiers::CONTROL),
                shift: m.modifiers.contains(crossterm::event::KeyModifiers::SHIFT),
                alt: m.modifiers.contains(crossterm::event::KeyModifiers::ALT),
            };
            Some(InputEvent::Mouse(MouseEvent { col: m.column, row: m.row, kind, mods }))
        }
        CtEvent::Resize(cols, rows) => Some(InputEvent::Resize(rows, cols)),
        _ => None,
    }
}

/// Spawns a blocking OS thread reading host terminal events, translating
/// them, and forwarding over a channel the async run loop selects on — the
/// same reader-thread-to-channel bridge used for PTY output (§5).
fn spawn_input_reader() -> mpsc::Receiver<InputEvent> {
    let (tx, rx) = mpsc::channel(256);
    std::thread::spawn(move || loop {
        match crossterm::event::read() {
            Ok(event) => {
                if let Some(ev) = convert_crossterm_event(event) {
                    if tx.blocking_send(ev).is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, "host terminal: read failed");
                return;
            }
        }
    });
    rx
}

async fn run_ctl(ctl: String, server: Option<String>) -> Result<()> {
    let addr = server.context("--ctl requires --server to know where to connect")?;
    let addr = ListenAddr::parse(&addr);
    let cmd: RemoteCommand =
        serde_norway::from_str(&ctl).context("parsing --ctl command as YAML")?;
    remote::send_one(addr, &cmd).await
}

async fn run_tui(cli: Cli) -> Result<()> {
    let decls = load_decls(&cli)?;

    let term_size = crossterm::terminal::size().unwrap_or((80, 24));
    let (cols, rows) = term_size;

    let guard = TerminalRestoreGuard::new();
    guard.enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    guard.enter_alt_screen(&mut stdout)?;
    guard.enable_mouse_capture(&mut stdout)?;

    sigwinch::install_sigwinch_handler()?;

    let mut terminal = ratatui::Terminal::new(ratatui::backend::CrosstermBackend::new(std::io::stdout()))?;

    let mut engine = Engine::new(decls, (rows, cols));
    engine.start_all();

    let mut input_rx = spawn_input_reader();
    let mut remote_rx = match &cli.server {
        Some(addr) => Some(remote::spawn_listener(ListenAddr::parse(addr))?),
        None => None,
    };

    let render = engine.render_scheduler();
    let mut resize_poll = tokio::time::interval(std::time::Duration::from_millis(50));

    loop {
        tokio::select! {
            _ = render.next_render() => {
                let view = engine.view();
                terminal.draw(|frame| {
                    painter::draw(frame, view.procs, view.ui, view.keymap_procs, view.keymap_term)
                })?;
            }
            Some(msg) = engine.recv_msg() => {
                engine.handle_engine_msg(msg);
            }
            Some(ev) = input_rx.recv() => {
                engine.handle_input(ev).await;
            }
            Some(cmd) = recv_remote(&mut remote_rx) => {
                engine.handle_remote_command(cmd).await;
            }
            _ = resize_poll.tick() => {
                if sigwinch::take_sigwinch() {
                    if let Ok((cols, rows)) = crossterm::terminal::size() {
                        engine.resize_all(rows, cols);
                    }
                }
            }
        }

        if engine.is_quitting() && engine.all_stopped() {
            break;
        }
    }

    drop(terminal);
    guard.restore();
    Ok(())
}

async fn recv_remote(rx: &mut Option<mpsc::Receiver<RemoteCommand>>) -> Option<RemoteCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logging_guard = logging::init_logging()?;

    let result = if let Some(ctl) = cli.ctl.clone() {
        run_ctl(ctl, cli.server.clone()).await
    } else {
        run_tui(cli).await
    };

    if let Err(err) = &result {
        eprintln!("devterm: {err:#}");
    }
    std::process::exit(if result.is_ok() { 0 } else { 1 });
}

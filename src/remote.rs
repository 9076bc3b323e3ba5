//! Remote control wire protocol (§6): a line-delimited YAML command stream
//! accepted over a Unix socket or a TCP address, forwarded to the engine's
//! run loop through an `mpsc` channel. One line is one document; `batch`
//! nests a list of further documents under the same envelope.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::mpsc;

/// One parsed remote command. Deserialized from a YAML mapping tagged on
/// its `c` field, e.g. `{c: select-proc, index: 2}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "c", rename_all = "kebab-case")]
pub enum RemoteCommand {
    Quit,
    ForceQuit,
    ToggleFocus,
    FocusProcs,
    FocusTerm,
    NextProc,
    PrevProc,
    SelectProc { index: usize },
    StartProc,
    TermProc,
    KillProc,
    RestartProc,
    ForceRestartProc,
    AddProc { cmd: Vec<String>, name: Option<String> },
    RemoveProc { id: String },
    RenameProc { name: String },
    ScrollUp,
    ScrollDown,
    ScrollDownLines { n: usize },
    SendKey { key: String },
    Batch { cmds: Vec<RemoteCommand> },
}

/// Where to listen for remote control connections (§6's `--server addr`).
/// A value containing `/` or starting with `.` is treated as a Unix socket
/// path; anything else is parsed as a TCP socket address.
#[derive(Clone, Debug)]
pub enum ListenAddr {
    Tcp(String),
    Unix(String),
}

impl ListenAddr {
    pub fn parse(spec: &str) -> Self {
        if spec.starts_with('/') || spec.starts_with('.') || spec.contains('/') {
            ListenAddr::Unix(spec.to_string())
        } else {
            ListenAddr::Tcp(spec.to_string())
        }
    }
}

/// Spawns the listener task and returns the receiving half the engine's run
/// loop polls. Each accepted connection is handled on its own task so one
/// slow or abandoned `--ctl` client can't stall another's commands; parsed
/// commands are funneled into the single shared channel since only the
/// engine's task may mutate proc state (§5).
pub fn spawn_listener(addr: ListenAddr) -> anyhow::Result<mpsc::Receiver<RemoteCommand>> {
    let (tx, rx) = mpsc::channel(256);

    match addr {
        ListenAddr::Tcp(spec) => {
            let listener_spec = spec.clone();
            tokio::spawn(async move {
                let listener = match TcpListener::bind(&listener_spec).await {
                    Ok(l) => l,
                    Err(err) => {
                        tracing::error!(addr = %listener_spec, %err, "remote control: bind failed");
                        return;
                    }
                };
                tracing::info!(addr = %listener_spec, "remote control listening (tcp)");
                loop {
                    match listener.accept().await {
                        Ok((stream, peer)) => {
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                serve_connection(stream, tx).await;
                                tracing::debug!(%peer, "remote control: connection closed");
                            });
                        }
                        Err(err) => {
                            tracing::warn!(%err, "remote control: accept failed");
                        }
                    }
                }
            });
        }
        ListenAddr::Unix(path) => {
            let _ = std::fs::remove_file(&path);
            let listener = UnixListener::bind(&path)?;
            let bound_path = path.clone();
            tokio::spawn(async move {
                tracing::info!(path = %bound_path, "remote control listening (unix)");
                loop {
                    match listener.accept().await {
                        Ok((stream, _addr)) => {
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                serve_connection(stream, tx).await;
                            });
                        }
                        Err(err) => {
                            tracing::warn!(%err, "remote control: accept failed");
                        }
                    }
                }
            });
        }
    }

    Ok(rx)
}

async fn serve_connection<S>(stream: S, tx: mpsc::Sender<RemoteCommand>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(%err, "remote control: read failed");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_norway::from_str::<RemoteCommand>(&line) {
            Ok(cmd) => {
                if tx.send(cmd).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                let msg = format!("error: {err}\n");
                let _ = write_half.write_all(msg.as_bytes()).await;
            }
        }
    }
}

/// One-shot send used by `--ctl`: connects, writes one YAML document, and
/// returns without waiting for a reply (the server is fire-and-forget from
/// the client's perspective, matching the engine's command channel).
pub async fn send_one(addr: ListenAddr, command: &RemoteCommand) -> anyhow::Result<()> {
    let doc = serde_norway::to_string(command)?;
    let line = format!("{}\n", doc.trim_end());

    match addr {
        ListenAddr::Tcp(spec) => {
            let mut stream = tokio::net::TcpStream::connect(&spec).await?;
            stream.write_all(line.as_bytes()).await?;
        }
        ListenAddr::Unix(path) => {
            let mut stream = tokio::net::UnixStream::connect(&path).await?;
            stream.write_all(line.as_bytes()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        let cmd: RemoteCommand = serde_norway::from_str("c: quit").unwrap();
        assert!(matches!(cmd, RemoteCommand::Quit));

        let cmd: RemoteCommand = serde_norway::from_str("c: select-proc\nindex: 3").unwrap();
        assert!(matches!(cmd, RemoteCommand::SelectProc { index: 3 }));
    }

    #[test]
    fn parses_batch_of_commands() {
        let yaml = "c: batch\ncmds:\n  - c: next-proc\n  - c: quit\n";
        let cmd: RemoteCommand = serde_norway::from_str(yaml).unwrap();
        match cmd {
            RemoteCommand::Batch { cmds } => {
                assert_eq!(cmds.len(), 2);
                assert!(matches!(cmds[0], RemoteCommand::NextProc));
                assert!(matches!(cmds[1], RemoteCommand::Quit));
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn parses_add_and_remove_proc_payloads() {
        let cmd: RemoteCommand =
            serde_norway::from_str("c: add-proc\ncmd: [\"npm\", \"run\", \"dev\"]\nname: dev\n").unwrap();
        assert!(matches!(cmd, RemoteCommand::AddProc { .. }));

        let cmd: RemoteCommand = serde_norway::from_str("c: remove-proc\nid: dev").unwrap();
        assert!(matches!(cmd, RemoteCommand::RemoveProc { .. }));
    }

    #[test]
    fn listen_addr_detects_unix_socket_paths() {
        assert!(matches!(ListenAddr::parse("/tmp/devterm.sock"), ListenAddr::Unix(_)));
        assert!(matches!(ListenAddr::parse("./devterm.sock"), ListenAddr::Unix(_)));
        assert!(matches!(ListenAddr::parse("127.0.0.1:4000"), ListenAddr::Tcp(_)));
    }

    #[tokio::test]
    async fn spawn_listener_forwards_parsed_commands_over_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("ctl.sock");
        let addr = ListenAddr::Unix(sock_path.to_str().unwrap().to_string());
        let mut rx = spawn_listener(addr.clone()).unwrap();

        // give the listener task a moment to bind before connecting.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        send_one(addr, &RemoteCommand::Quit).await.unwrap();

        let cmd = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(cmd, RemoteCommand::Quit));
    }
}

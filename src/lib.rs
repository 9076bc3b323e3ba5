//! `devterm` library: a terminal multiplexer for development workflows.
//! Spawns several declared processes, each in its own virtual terminal, and
//! renders them side by side in a single TUI.

pub mod config;
pub mod engine;
pub mod error;
pub mod keymap;
pub mod logging;
pub mod painter;
pub mod proc;
pub(crate) mod process_signal;
pub mod pty;
pub mod remote;
pub mod render;
pub mod sigwinch;
pub mod terminal_restore;
pub mod ui;
pub mod vterm;

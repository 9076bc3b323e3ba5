//! Configuration collaborator (§6): parses the user-declared process list
//! from JSON or a YAML superset, and the `--npm` package.json shortcut.
//! Everything here is read-only input — `ProcessDecl` is immutable after
//! load, matching §3's data model.

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A command to run: exactly one of `shell` or `cmd` in the source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Shell(String),
    Program { program: String, args: Vec<String> },
}

/// How `stop()` should ask a process to end, from the config's `stop` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopMode {
    Sigint,
    Sigterm,
    Sigkill,
    HardKill,
    SendKeys(Vec<String>),
}

impl Default for StopMode {
    fn default() -> Self {
        // Not specified by the distilled spec; SIGTERM is the conventional
        // default for "ask a process to stop" tooling in this lineage.
        StopMode::Sigterm
    }
}

/// One declared process. Immutable after `load`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessDecl {
    pub name: String,
    pub command: Command,
    /// Ordered so deterministic re-application is possible; `None` value
    /// means unset the variable, absent key means inherit the parent's.
    pub env: Vec<(String, Option<String>)>,
    pub cwd: Option<String>,
    pub tty: bool,
    pub autostart: bool,
    pub autorestart: bool,
    pub stop: StopMode,
}

impl ProcessDecl {
    pub fn program_and_args(&self) -> (String, Vec<String>) {
        match &self.command {
            Command::Shell(s) => (
                "/bin/sh".to_string(),
                vec!["-c".to_string(), s.clone()],
            ),
            Command::Program { program, args } => (program.clone(), args.clone()),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawProcDecl {
    shell: Option<String>,
    cmd: Option<Vec<String>>,
    #[serde(default)]
    env: BTreeMap<String, Option<String>>,
    cwd: Option<String>,
    #[serde(default = "default_true")]
    tty: bool,
    #[serde(default = "default_true")]
    autostart: bool,
    #[serde(default)]
    autorestart: bool,
    stop: Option<RawStop>,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStop {
    Named(String),
    SendKeys { #[serde(rename = "send-keys")] send_keys: Vec<String> },
}

#[derive(Deserialize)]
struct RawConfig {
    procs: BTreeMap<String, RawProcDecl>,
}

fn convert(name: &str, raw: RawProcDecl) -> Result<ProcessDecl, ConfigError> {
    let command = match (raw.shell, raw.cmd) {
        (Some(shell), None) => Command::Shell(shell),
        (None, Some(mut cmd)) => {
            if cmd.is_empty() {
                return Err(ConfigError::MissingCommand { name: name.to_string() });
            }
            let program = cmd.remove(0);
            Command::Program { program, args: cmd }
        }
        (None, None) => return Err(ConfigError::MissingCommand { name: name.to_string() }),
        (Some(_), Some(_)) => return Err(ConfigError::AmbiguousCommand { name: name.to_string() }),
    };

    let env = raw.env.into_iter().collect();

    let stop = match raw.stop {
        None => StopMode::default(),
        Some(RawStop::Named(s)) => match s.as_str() {
            "SIGINT" => StopMode::Sigint,
            "SIGTERM" => StopMode::Sigterm,
            "SIGKILL" => StopMode::Sigkill,
            "hard-kill" => StopMode::HardKill,
            _ => StopMode::default(),
        },
        Some(RawStop::SendKeys { send_keys }) => StopMode::SendKeys(send_keys),
    };

    Ok(ProcessDecl {
        name: name.to_string(),
        command,
        env,
        cwd: raw.cwd,
        tty: raw.tty,
        autostart: raw.autostart,
        autorestart: raw.autorestart,
        stop,
    })
}

/// Load declarations from a `.json`, `.yaml`/`.yml` file. Unknown extensions
/// are parsed as JSON.
pub fn load(path: &Path) -> Result<Vec<ProcessDecl>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let raw: RawConfig = if is_yaml {
        serde_norway::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source: source.into(),
        })?
    } else {
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source: source.into(),
        })?
    };

    raw.procs
        .into_iter()
        .map(|(name, decl)| convert(&name, decl))
        .collect()
}

/// Load one `ProcessDecl` per `package.json` script, as `npm run <name>`.
pub fn load_npm(path: &Path) -> Result<Vec<ProcessDecl>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    #[derive(Deserialize)]
    struct PackageJson {
        #[serde(default)]
        scripts: BTreeMap<String, String>,
    }

    let pkg: PackageJson = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source: source.into(),
    })?;

    Ok(pkg
        .scripts
        .into_keys()
        .map(|name| ProcessDecl {
            command: Command::Shell(format!("npm run {name}")),
            name,
            env: Vec::new(),
            cwd: None,
            tty: true,
            autostart: true,
            autorestart: false,
            stop: StopMode::default(),
        })
        .collect())
}

/// Apply `--names` filtering: every declared proc is kept, but `autostart`
/// is forced false for names outside the requested subset (§"Supplemented
/// features" 1 — declared-but-not-started procs remain selectable/startable
/// by hand).
pub fn apply_name_filter(decls: &mut [ProcessDecl], names: &[String]) -> Result<(), ConfigError> {
    if names.is_empty() {
        return Ok(());
    }
    for name in names {
        if !decls.iter().any(|d| &d.name == name) {
            return Err(ConfigError::UnknownName { name: name.clone() });
        }
    }
    for decl in decls.iter_mut() {
        if !names.contains(&decl.name) {
            decl.autostart = false;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_shell_and_cmd_variants() {
        let file = write_temp(
            r#"{"procs": {"a": {"shell": "echo hi"}, "b": {"cmd": ["printf", "x"]}}}"#,
            ".json",
        );
        let decls = load(file.path()).unwrap();
        assert_eq!(decls.len(), 2);
        let a = decls.iter().find(|d| d.name == "a").unwrap();
        assert_eq!(a.command, Command::Shell("echo hi".to_string()));
        let b = decls.iter().find(|d| d.name == "b").unwrap();
        assert_eq!(
            b.command,
            Command::Program { program: "printf".to_string(), args: vec!["x".to_string()] }
        );
    }

    #[test]
    fn defaults_match_spec() {
        let file = write_temp(r#"{"procs": {"a": {"shell": "true"}}}"#, ".json");
        let decls = load(file.path()).unwrap();
        let a = &decls[0];
        assert!(a.tty);
        assert!(a.autostart);
        assert!(!a.autorestart);
    }

    #[test]
    fn yaml_superset_is_accepted() {
        let file = write_temp("procs:\n  a:\n    shell: \"true\"\n", ".yaml");
        let decls = load(file.path()).unwrap();
        assert_eq!(decls.len(), 1);
    }

    #[test]
    fn missing_command_is_an_error() {
        let file = write_temp(r#"{"procs": {"a": {}}}"#, ".json");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCommand { .. }));
    }

    #[test]
    fn name_filter_forces_autostart_false_for_excluded() {
        let mut decls = vec![
            ProcessDecl {
                name: "a".into(),
                command: Command::Shell("true".into()),
                env: vec![],
                cwd: None,
                tty: true,
                autostart: true,
                autorestart: false,
                stop: StopMode::default(),
            },
            ProcessDecl {
                name: "b".into(),
                command: Command::Shell("true".into()),
                env: vec![],
                cwd: None,
                tty: true,
                autostart: true,
                autorestart: false,
                stop: StopMode::default(),
            },
        ];
        apply_name_filter(&mut decls, &["a".to_string()]).unwrap();
        assert!(decls[0].autostart);
        assert!(!decls[1].autostart);
    }

    #[test]
    fn name_filter_rejects_unknown_name() {
        let mut decls = vec![ProcessDecl {
            name: "a".into(),
            command: Command::Shell("true".into()),
            env: vec![],
            cwd: None,
            tty: true,
            autostart: true,
            autorestart: false,
            stop: StopMode::default(),
        }];
        let err = apply_name_filter(&mut decls, &["nope".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownName { .. }));
    }

    #[test]
    fn npm_scripts_become_shell_procs() {
        let file = write_temp(
            r#"{"scripts": {"build": "tsc", "test": "jest"}}"#,
            ".json",
        );
        let decls = load_npm(file.path()).unwrap();
        assert_eq!(decls.len(), 2);
        assert!(decls.iter().any(|d| d.name == "build"
            && d.command == Command::Shell("npm run build".to_string())));
    }
}

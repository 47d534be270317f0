use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use cephfs_client::{CephError, ClientConfig, ConfigLoadError, MountSession, MountStub};
use cephfs_logging::LogConfig;

/// Small command-line client for a CephFS filesystem.
///
/// Each invocation creates a session, loads the ceph configuration, mounts,
/// runs one command and closes the session.
#[derive(Parser, Debug)]
#[command(name = "cephfs-shell", version, about)]
struct Cli {
    /// TOML file with `[client]` and `[logging]` sections.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Alternate ceph.conf (overrides `client.conf_file`).
    #[arg(long)]
    conf: Option<PathBuf>,

    /// Client id (overrides `client.client_id`).
    #[arg(long)]
    id: Option<String>,

    /// Subtree to mount (overrides `client.mount_root`).
    #[arg(long)]
    root: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// List a directory.
    Ls {
        #[arg(default_value = ".")]
        path: String,
    },
    /// Create a directory.
    Mkdir {
        path: String,
        /// Permission bits, in octal.
        #[arg(short, long, default_value = "755", value_parser = parse_mode)]
        mode: u32,
    },
    /// Remove an empty directory.
    Rmdir { path: String },
    /// Rename a file or directory.
    Mv { from: String, to: String },
    /// Show filesystem capacity.
    Statfs,
    /// Print one extended attribute, or all of them when no name is given.
    Getfattr { path: String, name: Option<String> },
    /// Set an extended attribute.
    Setfattr {
        path: String,
        name: String,
        value: String,
    },
    /// Remove an extended attribute.
    Rmfattr { path: String, name: String },
    /// Flush pending state to the cluster.
    Sync,
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        Ok(mode) => Err(format!("mode {:o} out of range", mode)),
        Err(e) => Err(format!("invalid octal mode {:?}: {}", s, e)),
    }
}

/// Shell config file: a `[client]` section in the client library's own
/// format plus a `[logging]` section. Both are optional.
#[derive(Debug, Clone, Default)]
struct ShellConfig {
    client: ClientConfig,
    logging: LogConfig,
}

impl ShellConfig {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("loading {}", path.display()))
    }

    fn from_toml_str(content: &str) -> Result<Self, ConfigLoadError> {
        let mut doc: toml::Table = toml::from_str(content)?;
        let client = match doc.remove("client") {
            Some(section) => ClientConfig::from_toml_value(section)?,
            None => ClientConfig::default(),
        };
        let logging = match doc.remove("logging") {
            Some(section) => section.try_into::<LogConfig>()?,
            None => LogConfig::default(),
        };
        Ok(Self { client, logging })
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<ShellConfig> {
    let mut config = match &cli.config {
        Some(path) => ShellConfig::load(path)?,
        None => ShellConfig::default(),
    };
    if let Some(conf) = &cli.conf {
        config.client.conf_file = Some(conf.clone());
    }
    if let Some(id) = &cli.id {
        config.client.client_id = Some(id.clone());
    }
    if let Some(root) = &cli.root {
        config.client.mount_root = Some(root.clone());
    }
    if cli.verbose {
        config.logging.level = "debug".into();
    }
    config.client.validate()?;
    Ok(config)
}

/// Run one command on a mounted session, writing results to `out`.
#[cfg_attr(not(feature = "native"), allow(dead_code))]
fn run<M: MountStub>(
    session: &MountSession<M>,
    command: &Command,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Ls { path } => {
            for entry in session.read_dir(path)? {
                writeln!(out, "{}", entry?)?;
            }
        }
        Command::Mkdir { path, mode } => session.make_directory(path, *mode)?,
        Command::Rmdir { path } => session.remove_directory(path)?,
        Command::Mv { from, to } => session.rename(from, to)?,
        Command::Statfs => {
            let stats = session.get_fs_stats()?;
            writeln!(out, "fsid:        {:#x}", stats.fs_id)?;
            writeln!(out, "block size:  {} KB", stats.block_size_kb)?;
            writeln!(out, "total:       {} KB", stats.total_kb)?;
            writeln!(out, "used:        {} KB", stats.used_kb)?;
            writeln!(out, "available:   {} KB", stats.available_kb)?;
            writeln!(out, "usage:       {:.1}%", stats.usage_ratio() * 100.0)?;
        }
        Command::Getfattr { path, name: Some(name) } => {
            let attr = session.get_extended_attribute(path, name)?;
            writeln!(out, "{}={}", attr.key, String::from_utf8_lossy(&attr.value))?;
        }
        Command::Getfattr { path, name: None } => {
            for attr in session.list_extended_attributes(path)? {
                writeln!(out, "{}={}", attr.key, String::from_utf8_lossy(&attr.value))?;
            }
        }
        Command::Setfattr { path, name, value } => {
            session.set_extended_attribute(path, name, value)?
        }
        Command::Rmfattr { path, name } => session.remove_extended_attribute(path, name)?,
        Command::Sync => session.sync_fs()?,
    }
    Ok(())
}

#[cfg(feature = "native")]
fn execute(config: ClientConfig, command: &Command) -> anyhow::Result<()> {
    let session =
        cephfs_client::native::connect_and_mount(config).context("mounting filesystem")?;
    let stdout = std::io::stdout();
    let result = run(&session, command, &mut stdout.lock());
    session.close()?;
    result
}

#[cfg(not(feature = "native"))]
fn execute(_config: ClientConfig, _command: &Command) -> anyhow::Result<()> {
    anyhow::bail!("cephfs-shell was built without the `native` feature; rebuild with --features native")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let _guard = cephfs_logging::init_logging(&config.logging)?;
    let result = execute(config.client, &cli.command);
    if let Some(err) = result.as_ref().err().and_then(|e| e.downcast_ref::<CephError>()) {
        tracing::error!(op = err.op(), code = err.code(), errno = err.errno(), "command failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cephfs_stubs::{MockCluster, MockMount};

    fn mounted(cluster: &MockCluster) -> MountSession<MockMount> {
        let session = MountSession::create(cluster, ClientConfig::default()).unwrap();
        session.read_default_config().unwrap();
        session.mount().unwrap();
        session
    }

    fn run_to_string(session: &MountSession<MockMount>, args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("cephfs-shell").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        run(session, &cli.command, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("755"), Ok(0o755));
        assert_eq!(parse_mode("0o700"), Ok(0o700));
        assert!(parse_mode("9").is_err());
        assert!(parse_mode("77777").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "cephfs-shell",
            "--id",
            "admin",
            "--root",
            "/volumes/v1",
            "-v",
            "statfs",
        ])
        .unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.client.client_id.as_deref(), Some("admin"));
        assert_eq!(config.client.mount_root.as_deref(), Some("/volumes/v1"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(cli.command, Command::Statfs);
    }

    #[test]
    fn test_relative_root_rejected() {
        let cli = Cli::try_parse_from(["cephfs-shell", "--root", "rel", "sync"]).unwrap();
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_shell_config_sections() {
        let config = ShellConfig::from_toml_str(
            r#"
            [client]
            client_id = "svc"

            [client.xattr]
            write_mode = "upsert"

            [logging]
            level = "warn"
            "#,
        )
        .unwrap();
        assert_eq!(config.client.client_id.as_deref(), Some("svc"));
        assert_eq!(
            config.client.xattr.write_mode,
            cephfs_client::XattrWriteMode::Upsert
        );
        assert_eq!(config.logging.level, "warn");

        let empty = ShellConfig::from_toml_str("").unwrap();
        assert_eq!(empty.client, ClientConfig::default());
        assert_eq!(empty.logging, LogConfig::default());
    }

    #[test]
    fn test_shell_config_uses_client_validation() {
        let err = ShellConfig::from_toml_str(
            r#"
            [client.xattr]
            initial_buffer = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid(_)));

        let err = ShellConfig::from_toml_str("[logging]\nlevel = 3\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse(_)));
    }

    #[test]
    fn test_load_reports_file_errors() {
        let dir = std::env::temp_dir().join(format!("cephfs-shell-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("shell.toml");
        std::fs::write(&path, "[client]\nmount_root = \"rel\"\n").unwrap();
        let err = ShellConfig::load(&path).unwrap_err();
        assert!(err.downcast_ref::<ConfigLoadError>().is_some());
        assert!(ShellConfig::load(&dir.join("missing.toml")).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_mkdir_ls_mv() {
        let cluster = MockCluster::new();
        let session = mounted(&cluster);
        run_to_string(&session, &["mkdir", "-m", "700", "/a"]).unwrap();
        assert_eq!(cluster.mode_of("/a"), Some(0o700));
        assert_eq!(run_to_string(&session, &["ls", "/"]).unwrap(), "a\n");
        run_to_string(&session, &["mv", "/a", "/b"]).unwrap();
        assert_eq!(run_to_string(&session, &["ls"]).unwrap(), "b\n");
        run_to_string(&session, &["rmdir", "/b"]).unwrap();
        assert_eq!(run_to_string(&session, &["ls"]).unwrap(), "");
    }

    #[test]
    fn test_fattr_commands() {
        let cluster = MockCluster::new();
        let session = mounted(&cluster);
        run_to_string(&session, &["setfattr", "/", "user.k", "v1"]).unwrap();
        assert_eq!(
            run_to_string(&session, &["getfattr", "/", "user.k"]).unwrap(),
            "user.k=v1\n"
        );
        assert_eq!(run_to_string(&session, &["getfattr", "/"]).unwrap(), "user.k=v1\n");
        run_to_string(&session, &["rmfattr", "/", "user.k"]).unwrap();
        let err = run_to_string(&session, &["getfattr", "/", "user.k"]).unwrap_err();
        let err = err.downcast::<cephfs_client::CephError>().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_statfs_and_sync() {
        let cluster = MockCluster::new();
        let session = mounted(&cluster);
        let out = run_to_string(&session, &["statfs"]).unwrap();
        assert!(out.contains("total:       4194304 KB"));
        assert!(out.contains("usage:       25.0%"));
        run_to_string(&session, &["sync"]).unwrap();
    }
}

//! A backend driving the `snapper` command line tool.
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::{Connect, SnapshotBackend, SnapshotHandle, SnapshotKind};
use crate::error::{Error, ErrorContext, ErrorKind};
use crate::scd::Scd;

/// The program run when none is given.
pub const SNAPPER_PROGRAM: &str = "snapper";

/// Runs `snapper` to bind to configs.
#[derive(Debug, Clone)]
pub struct SnapperCli {
    program: PathBuf,
    /// Arguments passed before our own, for wrappers.
    leading_args: Vec<OsString>,
}

impl Default for SnapperCli {
    fn default() -> Self {
        SnapperCli {
            program: PathBuf::from(SNAPPER_PROGRAM),
            leading_args: Vec::new(),
        }
    }
}

impl SnapperCli {
    pub fn new() -> Self {
        Default::default()
    }

    /// Use a different program (for example a wrapper script run through a shell).
    pub fn with_program<I, S>(program: impl Into<PathBuf>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        SnapperCli {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Start a command for `config_name` on the system at `root`.
    ///
    /// snapper can only operate on another root without going through its daemon.
    fn command(&self, config_name: &str, root: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        if root != Path::new("/") {
            cmd.arg("--no-dbus").arg("--root").arg(root);
        }
        cmd.arg("-c").arg(config_name);
        cmd
    }
}

impl Connect for SnapperCli {
    fn connect(&self, config_name: &str, root: &Path) -> Result<Box<dyn SnapshotBackend>, Error> {
        let mut cmd = self.command(config_name, root);
        cmd.arg("--csvout").arg("get-config");
        let output = run(&mut cmd).with_context(|e| {
            ErrorKind::BackendUnavailable(format!("cannot run {}: {}", SNAPPER_PROGRAM, e))
        })?;
        if !output.status.success() {
            let stderr = stderr_message(&output);
            let lower = stderr.to_ascii_lowercase();
            let kind = if lower.contains("unknown config") || lower.contains("not found") {
                ErrorKind::ConfigNotFound(config_name.to_owned())
            } else {
                ErrorKind::BackendUnavailable(stderr.clone())
            };
            return Err(Error::from(kind).with_source(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let subvolume = config_value(&stdout, "SUBVOLUME").ok_or_else(|| {
            Error::from(ErrorKind::UnexpectedBackendOutput(stdout.trim().to_owned()))
        })?;
        let relative = Path::new(&subvolume)
            .strip_prefix("/")
            .unwrap_or_else(|_| Path::new(&subvolume));
        let subvolume_dir = if relative.as_os_str().is_empty() {
            root.to_owned()
        } else {
            root.join(relative)
        };

        Ok(Box::new(CliBackend {
            cli: self.clone(),
            config_name: config_name.to_owned(),
            root: root.to_owned(),
            subvolume_dir,
        }))
    }
}

/// A snapper config bound through the command line tool.
#[derive(Debug)]
pub struct CliBackend {
    cli: SnapperCli,
    config_name: String,
    root: PathBuf,
    subvolume_dir: PathBuf,
}

impl CliBackend {
    fn create(
        &self,
        kind: SnapshotKind,
        pre: Option<&SnapshotHandle>,
        scd: &Scd,
    ) -> Result<SnapshotHandle, Error> {
        let userdata = format_userdata(&scd.userdata)?;

        let mut cmd = self.cli.command(&self.config_name, &self.root);
        cmd.arg("create").arg("--type").arg(kind.to_string());
        if let Some(pre) = pre {
            cmd.arg("--pre-number").arg(pre.number().to_string());
        }
        cmd.arg("--print-number")
            .arg("--cleanup-algorithm")
            .arg(&scd.cleanup)
            .arg("--description")
            .arg(&scd.description);
        if !userdata.is_empty() {
            cmd.arg("--userdata").arg(userdata);
        }

        let output = run(&mut cmd).context(ErrorKind::CreateSnapshot(kind))?;
        if !output.status.success() {
            return Err(Error::create_snapshot(kind, stderr_message(&output)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let number = stdout
            .trim()
            .parse::<u32>()
            .context(ErrorKind::UnexpectedBackendOutput(stdout.trim().to_owned()))?;
        Ok(SnapshotHandle::new(number))
    }
}

impl SnapshotBackend for CliBackend {
    fn config_name(&self) -> &str {
        &self.config_name
    }

    fn subvolume_dir(&self) -> &Path {
        &self.subvolume_dir
    }

    fn create_pre_snapshot(&mut self, scd: &Scd) -> Result<SnapshotHandle, Error> {
        self.create(SnapshotKind::Pre, None, scd)
    }

    fn create_post_snapshot(
        &mut self,
        pre: &SnapshotHandle,
        scd: &Scd,
    ) -> Result<SnapshotHandle, Error> {
        self.create(SnapshotKind::Post, Some(pre), scd)
    }
}

fn run(cmd: &mut Command) -> std::io::Result<Output> {
    debug!("running {:?}", cmd);
    cmd.output()
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if stderr.is_empty() {
        format!("{} exited with {}", SNAPPER_PROGRAM, output.status)
    } else {
        stderr
    }
}

/// Find `key` in the csv output of `get-config`.
fn config_value(csv: &str, key: &str) -> Option<String> {
    csv.lines()
        .filter_map(|line| {
            let comma = line.find(',')?;
            Some((&line[..comma], &line[comma + 1..]))
        })
        .find(|(k, _)| k.trim() == key)
        .map(|(_, value)| value.trim().trim_matches('"').to_owned())
}

/// snapper takes userdata as `key=value,key=value`, with no way of escaping.
fn format_userdata(userdata: &BTreeMap<String, String>) -> Result<String, Error> {
    let mut entries = Vec::with_capacity(userdata.len());
    for (key, value) in userdata {
        let entry = format!("{}={}", key, value);
        if key.is_empty() || key.contains(|c: char| c == ',' || c == '=') || value.contains(',') {
            return Err(ErrorKind::InvalidUserdata(entry).into());
        }
        entries.push(entry);
    }
    Ok(entries.join(","))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// A fake snapper that logs its arguments and answers like the real one.
    fn fake_snapper(dir: &TempDir, script: &str) -> (SnapperCli, PathBuf) {
        let log = dir.path().join("calls.log");
        let path = dir.path().join("snapper.sh");
        fs::write(
            &path,
            format!(
                "printf '%s\\n' \"$*\" >> '{}'\n{}\n",
                log.display(),
                script
            ),
        )
        .unwrap();
        (SnapperCli::with_program("sh", vec![path]), log)
    }

    const WORKING: &str = r#"
case "$*" in
    *get-config*) printf 'Key,Value\nFSTYPE,btrfs\nSUBVOLUME,/\n' ;;
    *"--type pre"*) echo 41 ;;
    *"--type post"*) echo 42 ;;
esac"#;

    fn calls(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn pre_and_post() {
        let dir = TempDir::new().unwrap();
        let (cli, log) = fake_snapper(&dir, WORKING);
        let mut backend = cli.connect("root", Path::new("/")).unwrap();
        assert_eq!(backend.config_name(), "root");
        assert_eq!(backend.subvolume_dir(), Path::new("/"));

        let mut scd = Scd::new("DNF (installed 1)");
        scd.mark_important();
        let pre = backend.create_pre_snapshot(&scd).unwrap();
        assert_eq!(pre.number(), 41);
        let post = backend.create_post_snapshot(&pre, &scd).unwrap();
        assert_eq!(post.number(), 42);

        assert_eq!(
            calls(&log),
            vec![
                "-c root --csvout get-config",
                "-c root create --type pre --print-number --cleanup-algorithm number \
                 --description DNF (installed 1) --userdata important=yes",
                "-c root create --type post --pre-number 41 --print-number \
                 --cleanup-algorithm number --description DNF (installed 1) \
                 --userdata important=yes",
            ]
        );
    }

    #[test]
    fn other_root() {
        let dir = TempDir::new().unwrap();
        let (cli, log) = fake_snapper(&dir, WORKING);
        let mut backend = cli.connect("home", Path::new("/mnt/sysimage")).unwrap();
        assert_eq!(backend.subvolume_dir(), Path::new("/mnt/sysimage"));
        backend.create_pre_snapshot(&Scd::new("DNF ()")).unwrap();
        assert_eq!(
            calls(&log),
            vec![
                "--no-dbus --root /mnt/sysimage -c home --csvout get-config",
                "--no-dbus --root /mnt/sysimage -c home create --type pre --print-number \
                 --cleanup-algorithm number --description DNF ()",
            ]
        );
    }

    #[test]
    fn unknown_config() {
        let dir = TempDir::new().unwrap();
        let (cli, _) = fake_snapper(&dir, "echo 'Unknown config.' >&2\nexit 1");
        let err = cli.connect("nope", Path::new("/")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigNotFound("nope".into()));
    }

    #[test]
    fn missing_program() {
        let cli = SnapperCli::with_program("/nonexistent/snapper", Vec::<String>::new());
        let err = cli.connect("root", Path::new("/")).unwrap_err();
        match err.kind() {
            ErrorKind::BackendUnavailable(_) => (),
            other => panic!("unexpected error kind {:?}", other),
        }
    }

    #[test]
    fn create_failure() {
        let dir = TempDir::new().unwrap();
        let script = r#"
case "$*" in
    *get-config*) printf 'Key,Value\nSUBVOLUME,/home\n' ;;
    *) echo 'Creating snapshot failed.' >&2; exit 1 ;;
esac"#;
        let (cli, _) = fake_snapper(&dir, script);
        let mut backend = cli.connect("home", Path::new("/")).unwrap();
        assert_eq!(backend.subvolume_dir(), Path::new("/home"));
        let err = backend.create_pre_snapshot(&Scd::new("DNF ()")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::CreateSnapshot(SnapshotKind::Pre));
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "Creating snapshot failed."
        );
    }

    #[test]
    fn garbage_number() {
        let dir = TempDir::new().unwrap();
        let script = r#"
case "$*" in
    *get-config*) printf 'Key,Value\nSUBVOLUME,/\n' ;;
    *) echo 'not a number' ;;
esac"#;
        let (cli, _) = fake_snapper(&dir, script);
        let mut backend = cli.connect("root", Path::new("/")).unwrap();
        let err = backend.create_pre_snapshot(&Scd::new("DNF ()")).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::UnexpectedBackendOutput("not a number".into())
        );
    }

    #[test]
    fn userdata_format() {
        let mut userdata = BTreeMap::new();
        assert_eq!(format_userdata(&userdata).unwrap(), "");
        userdata.insert("important".to_owned(), "yes".to_owned());
        userdata.insert("rpm:installed".to_owned(), "2".to_owned());
        assert_eq!(
            format_userdata(&userdata).unwrap(),
            "important=yes,rpm:installed=2"
        );
        userdata.insert("bad,key".to_owned(), "1".to_owned());
        assert_eq!(
            format_userdata(&userdata).unwrap_err().kind(),
            &ErrorKind::InvalidUserdata("bad,key=1".into())
        );
    }

    #[test]
    fn csv_config() {
        let csv = "Key,Value\nALLOW_GROUPS,\"wheel,admin\"\nSUBVOLUME,\"/\"\n";
        assert_eq!(config_value(csv, "SUBVOLUME"), Some("/".to_owned()));
        assert_eq!(config_value(csv, "FSTYPE"), None);
    }
}

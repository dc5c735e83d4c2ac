//! Getting `libtimewarp.so` into a target process
//!
//! - `launch`: spawn a new process with the library on `LD_PRELOAD`
//! - `inject`/`attach`: load it into a running process through gdb

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use timewarp_core::{default_socket_path, TimewarpError, TimewarpResult, ENV_LIBRARY, ENV_SOCKET_PATH};

use crate::SpeedClient;

/// File name of the interposition library
pub const LIBRARY_NAME: &str = "libtimewarp.so";

/// Locate the library: explicit path, then `TIMEWARP_LIBRARY`, then next to the running executable
pub fn find_library(explicit: Option<&Path>) -> TimewarpResult<PathBuf> {
    let candidate = match explicit {
        Some(path) => path.to_path_buf(),
        None => match std::env::var_os(ENV_LIBRARY) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => std::env::current_exe()?
                .parent()
                .map(|dir| dir.join(LIBRARY_NAME))
                .unwrap_or_else(|| PathBuf::from(LIBRARY_NAME)),
        },
    };

    if !candidate.exists() {
        return Err(TimewarpError::LibraryNotFound(candidate));
    }
    Ok(candidate.canonicalize()?)
}

/// Prepend the library to an existing `LD_PRELOAD` value
pub fn preload_value(library: &Path, existing: Option<&OsString>) -> OsString {
    let mut value = OsString::from(library);
    if let Some(existing) = existing.filter(|v| !v.is_empty()) {
        value.push(":");
        value.push(existing);
    }
    value
}

/// A process started with the library preloaded
#[derive(Debug)]
pub struct Launched {
    pub pid: u32,
    pub child: Child,
    pub client: SpeedClient,
}

/// Spawn `cmd` with the library preloaded and connect to its control socket
pub async fn launch(
    cmd: &[String],
    library: &Path,
    socket_path: Option<&Path>,
    wait: Duration,
) -> TimewarpResult<Launched> {
    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| TimewarpError::Injection("empty command".into()))?;

    let mut command = Command::new(program);
    command.args(args).env(
        "LD_PRELOAD",
        preload_value(library, std::env::var_os("LD_PRELOAD").as_ref()),
    );
    if let Some(path) = socket_path {
        command.env(ENV_SOCKET_PATH, path);
    }

    let child = command.spawn()?;
    let pid = child
        .id()
        .ok_or_else(|| TimewarpError::Injection("child exited before it could be controlled".into()))?;

    let path = socket_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_socket_path(pid));
    tracing::debug!(pid, socket = %path.display(), "launched");

    let client = SpeedClient::connect(path, wait).await?;
    Ok(Launched { pid, child, client })
}

/// `/proc/<pid>/comm` holds at most this many bytes of the executable name
const COMM_MAX: usize = 15;

/// Lowest pid whose executable name is `name`
pub fn find_pid_by_name(name: &str) -> TimewarpResult<u32> {
    find_pid_in(Path::new("/proc"), name)
}

fn find_pid_in(proc_root: &Path, name: &str) -> TimewarpResult<u32> {
    let mut pids: Vec<u32> = std::fs::read_dir(proc_root)?
        .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
        .collect();
    pids.sort_unstable();

    // processes may exit mid-scan; an unreadable comm is just skipped
    pids.into_iter()
        .find(|pid| {
            std::fs::read_to_string(proc_root.join(pid.to_string()).join("comm"))
                .map(|comm| comm_matches(comm.trim_end_matches('\n'), name))
                .unwrap_or(false)
        })
        .ok_or_else(|| TimewarpError::ProcessNotFound(name.to_string()))
}

fn comm_matches(comm: &str, name: &str) -> bool {
    comm == name || (comm.len() == COMM_MAX && name.len() > COMM_MAX && name.starts_with(comm))
}

/// Escape a string for a gdb double-quoted literal
pub fn gdb_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// gdb arguments that load `library` into `pid`, optionally pointing it at `socket_path` first
pub fn gdb_args(pid: u32, library: &Path, socket_path: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "-n".to_string(),
        "-q".to_string(),
        "-batch".to_string(),
        "-ex".to_string(),
        format!("attach {pid}"),
    ];
    if let Some(path) = socket_path {
        args.push("-ex".into());
        args.push(format!(
            "call (int)setenv(\"{}\",\"{}\",1)",
            ENV_SOCKET_PATH,
            gdb_escape(&path.to_string_lossy())
        ));
    }
    args.extend([
        "-ex".to_string(),
        format!(
            "call (void*)dlopen(\"{}\", {})",
            gdb_escape(&library.to_string_lossy()),
            libc::RTLD_LAZY
        ),
        "-ex".to_string(),
        "detach".to_string(),
        "-ex".to_string(),
        "quit".to_string(),
    ]);
    args
}

/// Load the library into a running process
pub async fn inject(
    pid: u32,
    library: &Path,
    gdb: &Path,
    socket_path: Option<&Path>,
) -> TimewarpResult<()> {
    let output = Command::new(gdb)
        .args(gdb_args(pid, library, socket_path))
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                TimewarpError::Injection(format!("{} not found; install gdb or use launch", gdb.display()))
            }
            _ => TimewarpError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        return Err(TimewarpError::Injection(format!(
            "gdb exited with {}: {}",
            output.status,
            detail.trim()
        )));
    }
    Ok(())
}

/// Inject into `pid` and connect to its control socket
pub async fn attach(
    pid: u32,
    library: &Path,
    gdb: &Path,
    socket_path: Option<&Path>,
    wait: Duration,
) -> TimewarpResult<SpeedClient> {
    inject(pid, library, gdb, socket_path).await?;
    let path = socket_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_socket_path(pid));
    SpeedClient::connect(path, wait).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preload_prepends() {
        let lib = Path::new("/opt/tw/libtimewarp.so");
        assert_eq!(preload_value(lib, None), OsString::from("/opt/tw/libtimewarp.so"));
        assert_eq!(
            preload_value(lib, Some(&OsString::from("/usr/lib/libfoo.so"))),
            OsString::from("/opt/tw/libtimewarp.so:/usr/lib/libfoo.so")
        );
        assert_eq!(
            preload_value(lib, Some(&OsString::new())),
            OsString::from("/opt/tw/libtimewarp.so")
        );
    }

    #[test]
    fn test_gdb_escape() {
        assert_eq!(gdb_escape(r#"/tmp/a"b\c"#), r#"/tmp/a\"b\\c"#);
    }

    #[test]
    fn test_gdb_args_with_socket() {
        let args = gdb_args(
            4321,
            Path::new("/lib/libtimewarp.so"),
            Some(Path::new("/tmp/tw.sock")),
        );
        assert_eq!(&args[..5], &["-n", "-q", "-batch", "-ex", "attach 4321"]);
        assert!(args.contains(&"call (int)setenv(\"TIMEWARP_SOCKET_PATH\",\"/tmp/tw.sock\",1)".to_string()));
        assert!(args.iter().any(|a| a.starts_with("call (void*)dlopen(\"/lib/libtimewarp.so\"")));
        assert_eq!(args.last().map(String::as_str), Some("quit"));
    }

    #[test]
    fn test_gdb_args_without_socket() {
        let args = gdb_args(1, Path::new("/lib/libtimewarp.so"), None);
        assert!(!args.iter().any(|a| a.contains("setenv")));
    }

    #[test]
    fn test_missing_library() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(LIBRARY_NAME);
        assert!(matches!(
            find_library(Some(&missing)),
            Err(TimewarpError::LibraryNotFound(p)) if p == missing
        ));
    }

    #[test]
    fn test_explicit_library_found() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join(LIBRARY_NAME);
        std::fs::write(&lib, b"").unwrap();
        assert_eq!(find_library(Some(&lib)).unwrap(), lib.canonicalize().unwrap());
    }

    #[test]
    fn test_find_pid_by_comm() {
        let proc_root = tempfile::tempdir().unwrap();
        let add = |pid: &str, comm: Option<&str>| {
            let dir = proc_root.path().join(pid);
            std::fs::create_dir(&dir).unwrap();
            if let Some(comm) = comm {
                std::fs::write(dir.join("comm"), format!("{comm}\n")).unwrap();
            }
        };
        add("1", Some("init"));
        add("42", Some("game"));
        add("7", Some("game"));
        add("99", None);
        add("self", Some("game"));
        add("300", Some("averylongservic"));

        assert_eq!(find_pid_in(proc_root.path(), "game").unwrap(), 7);
        assert_eq!(find_pid_in(proc_root.path(), "averylongservice-bin").unwrap(), 300);
        assert!(matches!(
            find_pid_in(proc_root.path(), "gam"),
            Err(TimewarpError::ProcessNotFound(name)) if name == "gam"
        ));
    }

    #[test]
    fn test_finds_own_process() {
        let comm = std::fs::read_to_string("/proc/self/comm").unwrap();
        let pid = find_pid_by_name(comm.trim_end()).unwrap();
        assert!(pid <= std::process::id());
    }

    #[tokio::test]
    async fn test_launch_rejects_empty_command() {
        let result = launch(&[], Path::new("/lib/libtimewarp.so"), None, Duration::ZERO).await;
        assert!(matches!(result, Err(TimewarpError::Injection(_))));
    }
}

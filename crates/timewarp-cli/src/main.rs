use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use timewarp_control::{attach, find_library, find_pid_by_name, launch, SpeedClient};
use timewarp_core::default_socket_path;

#[derive(Parser, Debug)]
#[command(
    name = "timewarp",
    version,
    about = "Run a process in scaled virtual time and change its speed while it runs."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a command with the library preloaded
    Launch {
        #[command(flatten)]
        opts: ControlOpts,

        /// Path to libtimewarp.so (defaults to $TIMEWARP_LIBRARY, then next to this binary)
        #[arg(long, value_name = "PATH")]
        library: Option<PathBuf>,

        /// Command and arguments to run
        #[arg(last = true, required = true, value_name = "CMD")]
        cmd: Vec<String>,
    },
    /// Inject the library into a running process with gdb
    Attach {
        /// Target process id
        #[arg(required_unless_present = "name")]
        pid: Option<u32>,

        /// Target the lowest-numbered process with this executable name
        #[arg(long, conflicts_with = "pid")]
        name: Option<String>,

        #[command(flatten)]
        opts: ControlOpts,

        /// Path to libtimewarp.so (defaults to $TIMEWARP_LIBRARY, then next to this binary)
        #[arg(long, value_name = "PATH")]
        library: Option<PathBuf>,

        /// gdb executable
        #[arg(long, value_name = "PATH", default_value = "gdb")]
        gdb: PathBuf,
    },
    /// Change the speed of an already controlled process
    Set {
        /// Target process id (uses its default socket)
        #[arg(long, conflicts_with = "socket", required_unless_present = "socket")]
        pid: Option<u32>,

        /// Control socket path
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,

        /// New speed multiplier (0 freezes)
        speed: f32,

        /// Seconds to wait for the socket
        #[arg(long, value_name = "SECS", default_value_t = 1.0)]
        wait: f64,
    },
}

#[derive(Args, Debug)]
struct ControlOpts {
    /// Initial speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Seconds to wait for the control socket to appear
    #[arg(long, value_name = "SECS", default_value_t = 5.0)]
    wait: f64,

    /// Control socket path (defaults to /tmp/timewarp_<pid>.sock)
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
}

fn wait_duration(secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("invalid --wait {secs}"))
}

/// Shell-style exit code for a finished child
fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

fn print_target(pid: u32, socket: &Path) {
    println!("pid={} socket={}", pid, socket.display());
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Launch { opts, library, cmd } => {
            let library = find_library(library.as_deref())?;
            let wait = wait_duration(opts.wait)?;
            let mut launched = launch(&cmd, &library, opts.socket.as_deref(), wait)
                .await
                .with_context(|| format!("launch {}", cmd.join(" ")))?;

            launched.client.set_speed(opts.speed).await?;
            print_target(launched.pid, launched.client.path());
            launched.client.close().await?;

            let status = launched.child.wait().await.context("wait for child")?;
            tracing::debug!(%status, "child exited");
            Ok(exit_code(status))
        }
        Command::Attach {
            pid,
            name,
            opts,
            library,
            gdb,
        } => {
            let pid = match (pid, name) {
                (Some(pid), _) => pid,
                (None, Some(name)) => find_pid_by_name(&name)?,
                (None, None) => bail!("either PID or --name is required"),
            };
            let library = find_library(library.as_deref())?;
            let wait = wait_duration(opts.wait)?;
            let mut client = attach(pid, &library, &gdb, opts.socket.as_deref(), wait)
                .await
                .with_context(|| format!("attach to pid {pid}"))?;

            client.set_speed(opts.speed).await?;
            print_target(pid, client.path());
            client.close().await?;
            Ok(0)
        }
        Command::Set {
            pid,
            socket,
            speed,
            wait,
        } => {
            let path = match (socket, pid) {
                (Some(path), _) => path,
                (None, Some(pid)) => default_socket_path(pid),
                (None, None) => bail!("either --pid or --socket is required"),
            };
            let mut client = SpeedClient::connect(path, wait_duration(wait)?).await?;
            client.set_speed(speed).await?;
            client.close().await?;
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let code = run(Cli::parse()).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

//! Bounded execution of external commands.
//!
//! A [Runner] spawns one child process at a time, captures both of its
//! output streams and classifies the result. Commands that exit with a
//! non-zero status, or that exit cleanly but write to stderr, are reported
//! as a [RunError]. Stderr containing [PROFILING_MARKER] is tolerated by
//! default because instrumented builds of the daemon print profiling
//! warnings there.
use crate::errors::{FtestError, RunError};
use futures::join;
use std::{fmt, io, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    runtime, time,
};
use tracing::debug;

/// Exit code reported when a command overran its timeout and wrote to
/// stderr before being abandoned.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Exit code reported when the command could not be spawned at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Substring that marks stderr output as benign.
pub const PROFILING_MARKER: &str = "profiling";

/// A single command to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Join `argv` with spaces and run it through `sh -c`.
    pub shell: bool,
    /// Wall-clock limit. `None` waits for the command unconditionally.
    pub timeout: Option<Duration>,
    /// Accept a clean exit with stderr output if the output mentions
    /// profiling.
    pub ignore_profiling_errors: bool,
}

impl Invocation {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            shell: false,
            timeout: None,
            ignore_profiling_errors: true,
        }
    }

    pub fn with_shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Treat any stderr output on a clean exit as a failure.
    pub fn strict(mut self) -> Self {
        self.ignore_profiling_errors = false;
        self
    }

    fn construct_command(&self) -> io::Result<Command> {
        let mut cmd = if self.shell {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(self.argv.join(" "));
            cmd
        } else {
            let (program, args) = self.argv.split_first().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "empty command")
            })?;
            let mut cmd = Command::new(program);
            cmd.args(args);
            cmd
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.argv.join(" "))
    }
}

/// Exit code and trimmed output streams of a finished command.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// Decide whether this output counts as a successful run of `command`.
    /// Returns STDOUT on success.
    pub fn classify(
        self,
        command: &str,
        ignore_profiling_errors: bool,
    ) -> Result<String, RunError> {
        let benign = ignore_profiling_errors
            && self.stderr.contains(PROFILING_MARKER);
        if self.status != 0 || (!self.stderr.is_empty() && !benign) {
            return Err(RunError {
                command: command.to_string(),
                ret: self.status,
                stdout: self.stdout,
                stderr: self.stderr,
            });
        }
        Ok(self.stdout)
    }
}

fn decode(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).trim().to_string()
}

/// Read `reader` until EOF. Bytes are appended to `buf` as they arrive so a
/// cancelled read keeps everything received so far.
async fn drain<R: AsyncRead + Unpin>(
    reader: Option<&mut R>,
    buf: &mut Vec<u8>,
) -> io::Result<()> {
    if let Some(reader) = reader {
        reader.read_to_end(buf).await?;
    }
    Ok(())
}

async fn execute(invocation: &Invocation) -> io::Result<Output> {
    let mut child = invocation.construct_command()?.spawn()?;
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let (mut out, mut err) = (Vec::new(), Vec::new());

    let collect = async {
        let (read_out, read_err, status) = join!(
            drain(stdout.as_mut(), &mut out),
            drain(stderr.as_mut(), &mut err),
            child.wait()
        );
        read_out?;
        read_err?;
        status
    };

    let status = match invocation.timeout {
        None => Some(collect.await?),
        Some(limit) => match time::timeout(limit, collect).await {
            Ok(status) => Some(status?),
            Err(_) => None,
        },
    };

    let stdout = decode(&out);
    let stderr = decode(&err);
    let status = match status {
        Some(status) => status.code().unwrap_or(-1),
        // A timed out command that stayed quiet on stderr is not an error.
        None if stderr.is_empty() => 0,
        None => TIMEOUT_EXIT_CODE,
    };

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

/// Executes commands on a private single-threaded runtime. Calls block until
/// the command finishes or its timeout expires.
pub struct Runner {
    runtime: runtime::Runtime,
}

impl Runner {
    pub fn new() -> Result<Self, FtestError> {
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    /// Run the command and collect its output without classifying it.
    pub fn output(&self, invocation: &Invocation) -> Output {
        let output = self
            .runtime
            .block_on(execute(invocation))
            .unwrap_or_else(|err| Output {
                status: SPAWN_FAILURE_EXIT_CODE,
                stdout: String::new(),
                stderr: err.to_string(),
            });
        debug!(
            "run:\n\tcommand = {}\n\tret = {}\n\tstdout = {}\n\tstderr = {}",
            invocation, output.status, output.stdout, output.stderr
        );
        output
    }

    /// Run the command and return its STDOUT if it succeeded.
    pub fn run(&self, invocation: &Invocation) -> Result<String, RunError> {
        self.output(invocation).classify(
            &invocation.to_string(),
            invocation.ignore_profiling_errors,
        )
    }
}

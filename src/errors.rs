use std::{error, fmt, io, string};

/// An error that aborts a whole ftests run, typically a bad invocation or
/// an unreadable harness configuration.
pub struct FtestError(pub String);

impl fmt::Debug for FtestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FtestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl error::Error for FtestError {}

impl From<string::FromUtf8Error> for FtestError {
    fn from(err: string::FromUtf8Error) -> Self {
        FtestError(err.to_string())
    }
}

impl From<io::Error> for FtestError {
    fn from(err: io::Error) -> Self {
        FtestError(err.to_string())
    }
}

impl From<toml::de::Error> for FtestError {
    fn from(err: toml::de::Error) -> Self {
        FtestError(err.to_string())
    }
}

impl From<glob::PatternError> for FtestError {
    fn from(err: glob::PatternError) -> Self {
        FtestError(err.to_string())
    }
}

impl From<glob::GlobError> for FtestError {
    fn from(err: glob::GlobError) -> Self {
        FtestError(err.to_string())
    }
}

/// Any error escaping a unit's lifecycle. The execution engine turns these
/// into failed outcomes.
pub type Fault = Box<dyn error::Error + Send + Sync>;

/// An external command that exited with an unexpected status or wrote
/// unexpected output to stderr.
#[derive(Clone, PartialEq)]
pub struct RunError {
    /// The command line, joined with spaces.
    pub command: String,
    /// Exit code of the command. Killed processes report `-1`.
    pub ret: i32,
    /// Trimmed STDOUT of the command.
    pub stdout: String,
    /// Trimmed STDERR of the command.
    pub stderr: String,
}

impl fmt::Debug for RunError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RunError:\n\tcommand = {}\n\tret = {}\n\tstdout = {}\n\tstderr = {}",
            self.command, self.ret, self.stdout, self.stderr
        )
    }
}

impl error::Error for RunError {}

// Helper method to collapse nested Results
pub trait RichResult<T, E> {
    fn collapse(self) -> Result<T, E>;
}

impl<T, E> RichResult<T, E> for Result<Result<T, E>, E> {
    fn collapse(self) -> Result<T, E> {
        match self {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_lists_streams() {
        let err = RunError {
            command: "adaptived -c cfg.json".to_string(),
            ret: 3,
            stdout: "out".to_string(),
            stderr: "bad".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "RunError:\n\tcommand = adaptived -c cfg.json\n\tret = 3\n\tstdout = out\n\tstderr = bad"
        );
    }

    #[test]
    fn collapse_flattens_nested_results() {
        let ok: Result<Result<u8, String>, String> = Ok(Ok(1));
        let inner: Result<Result<u8, String>, String> = Ok(Err("in".into()));
        let outer: Result<Result<u8, String>, String> = Err("out".into());
        assert_eq!(ok.collapse(), Ok(1));
        assert_eq!(inner.collapse(), Err("in".to_string()));
        assert_eq!(outer.collapse(), Err("out".to_string()));
    }
}

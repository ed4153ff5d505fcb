//! Command line interface of the daemon under test.
//!
//! Config files whose path contains `.token` are templates. Before the
//! daemon starts, the template is expanded into the same path with `.token`
//! (and anything after it) removed, e.g. `001-cause.json.token` becomes
//! `001-cause.json`. The expanded file is deleted once the daemon exits.
use crate::{
    command::Invocation,
    errors::{FtestError, Fault},
    executor::unit::{remove_artifacts, Env},
    template,
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};

const TOKEN_SUFFIX: &str = ".token";

/// Flags for one invocation of the daemon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Daemon {
    /// `-c`: rules file, possibly a `.token` template.
    pub config: Option<PathBuf>,
    /// `-h`: print usage.
    pub help: bool,
    /// `-i`: main loop interval in milliseconds.
    pub interval: Option<u64>,
    /// `-L`: where the daemon logs.
    pub log_location: Option<String>,
    /// `-l`: daemon log level.
    pub log_level: Option<u8>,
    /// `-m`: stop after this many loops.
    pub max_loops: Option<u64>,
    /// Exit code that counts as success.
    pub expected_ret: Option<i32>,
    /// Abandon the daemon after this long.
    pub timeout: Option<Duration>,
}

/// Where the template at `config` gets expanded to, or `None` when `config`
/// is not a template. Only the file name is inspected; the expansion lands
/// in the template's own directory.
pub fn materialized_path(config: &Path) -> Option<PathBuf> {
    let name = config.file_name()?.to_string_lossy();
    match name.find(TOKEN_SUFFIX) {
        Some(idx) if idx > 0 => Some(match config.parent() {
            Some(dir) => dir.join(&name[..idx]),
            None => PathBuf::from(&name[..idx]),
        }),
        _ => None,
    }
}

/// An expanded template, removed when dropped.
struct Materialized(PathBuf);

impl Drop for Materialized {
    fn drop(&mut self) {
        if let Err(err) = remove_artifacts(&[self.0.clone()]) {
            warn!("{}", err);
        }
    }
}

/// Remove expanded templates left behind under `dir`, e.g. by a run that
/// was interrupted. Returns how many files were removed.
pub fn sweep_materialized(dir: &Path) -> Result<usize, FtestError> {
    let pattern = format!(
        "{}/**/*{}*",
        glob::Pattern::escape(&dir.to_string_lossy()),
        TOKEN_SUFFIX
    );
    let mut removed = 0;
    for template in glob::glob(&pattern)? {
        let path = match template.map(|t| materialized_path(&t)) {
            Ok(Some(path)) => path,
            Ok(None) => continue,
            Err(err) => {
                debug!("{}", err);
                continue;
            }
        };
        if path.starts_with(dir) && path.is_file() {
            remove_artifacts(&[path.clone()])?;
            debug!("Removed stale {}", path.to_string_lossy());
            removed += 1;
        }
    }
    Ok(removed)
}

impl Daemon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = Some(config.into());
        self
    }

    pub fn interval(mut self, interval: u64) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn max_loops(mut self, max_loops: u64) -> Self {
        self.max_loops = Some(max_loops);
        self
    }

    pub fn expected_ret(mut self, ret: i32) -> Self {
        self.expected_ret = Some(ret);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full command line with `config` as the rules file.
    pub fn arguments(&self, program: &Path, config: Option<&Path>) -> Vec<String> {
        let mut cmd = vec![program.to_string_lossy().to_string()];
        if let Some(config) = config {
            cmd.push("-c".to_string());
            cmd.push(config.to_string_lossy().to_string());
        }
        if self.help {
            cmd.push("-h".to_string());
        }
        if let Some(interval) = self.interval {
            cmd.push("-i".to_string());
            cmd.push(interval.to_string());
        }
        if let Some(location) = &self.log_location {
            cmd.push("-L".to_string());
            cmd.push(location.clone());
        }
        if let Some(level) = self.log_level {
            cmd.push("-l".to_string());
            cmd.push(level.to_string());
        }
        if let Some(loops) = self.max_loops {
            cmd.push("-m".to_string());
            cmd.push(loops.to_string());
        }
        cmd
    }

    /// Run the daemon configured in `env` and return its STDOUT.
    pub fn run(&self, env: &Env<'_>) -> Result<String, Fault> {
        let (config, _materialized) = match &self.config {
            Some(config) => match materialized_path(config) {
                Some(out) => {
                    template::expand(config, &out)?;
                    (Some(out.clone()), Some(Materialized(out)))
                }
                None => (Some(config.clone()), None),
            },
            None => (None, None),
        };

        let invocation = Invocation::new(
            self.arguments(&env.config.daemon, config.as_deref()),
        )
        .with_timeout(self.timeout);

        match env.runner.run(&invocation) {
            Ok(out) => Ok(out),
            Err(err) if Some(err.ret) == self.expected_ret => Ok(err.stdout),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn template_paths() {
        assert_eq!(
            materialized_path(Path::new("/t/001-cause.json.token")),
            Some(PathBuf::from("/t/001-cause.json"))
        );
        assert_eq!(materialized_path(Path::new("/t/001-cause.json")), None);
        assert_eq!(materialized_path(Path::new(".token")), None);
        assert_eq!(
            materialized_path(Path::new("/t/rules.token.d/001-cause.json")),
            None
        );
        assert_eq!(
            materialized_path(Path::new("/proj.tokens/t/r.json.token")),
            Some(PathBuf::from("/proj.tokens/t/r.json"))
        );
    }

    #[test]
    fn arguments_follow_flag_order() {
        let daemon = Daemon {
            help: true,
            log_location: Some("syslog".to_string()),
            log_level: Some(7),
            ..Daemon::new().interval(1000).max_loops(10)
        };
        assert_eq!(
            daemon.arguments(Path::new("src/adaptived"), Some(Path::new("r.json"))),
            [
                "src/adaptived", "-c", "r.json", "-h", "-i", "1000", "-L", "syslog",
                "-l", "7", "-m", "10"
            ]
        );
        assert_eq!(Daemon::new().arguments(Path::new("d"), None), ["d"]);
    }

    #[test]
    fn sweep_removes_only_expanded_templates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("001-cause.json.token"), "").unwrap();
        fs::write(dir.path().join("001-cause.json"), "").unwrap();
        fs::write(dir.path().join("002-cause.json"), "").unwrap();

        assert_eq!(sweep_materialized(dir.path()).unwrap(), 1);
        assert!(dir.path().join("001-cause.json.token").exists());
        assert!(!dir.path().join("001-cause.json").exists());
        assert!(dir.path().join("002-cause.json").exists());
        assert_eq!(sweep_materialized(dir.path()).unwrap(), 0);
    }

    #[test]
    fn sweep_stays_inside_the_test_directory() {
        let root = TempDir::new().unwrap();
        let bystander = root.path().join("proj");
        fs::write(&bystander, "keep me").unwrap();
        let ftests = root.path().join("proj.tokens/tests/ftests");
        fs::create_dir_all(&ftests).unwrap();
        fs::write(ftests.join("rules.json.token"), "").unwrap();
        fs::write(ftests.join("rules.json"), "").unwrap();

        assert_eq!(sweep_materialized(&ftests).unwrap(), 1);
        assert!(!ftests.join("rules.json").exists());
        assert_eq!(fs::read_to_string(&bystander).unwrap(), "keep me");
    }
}

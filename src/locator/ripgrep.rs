//! External `rg` search engine.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::locator::executor::{effective_globs, SearchExecutor, SearchOutcome, SearchSource};
use crate::locator::files::IGNORED_DIRS;
use crate::locator::normalizer::parse_ripgrep_events;
use crate::types::PatternEntry;

/// Default ripgrep binary name, resolved through `PATH`.
pub const DEFAULT_RG: &str = "rg";

/// Runs `rg --json --multiline` once per pattern.
#[derive(Debug, Clone)]
pub struct RipgrepExecutor {
    program: PathBuf,
    timeout: Duration,
    /// `--version` probe result, computed on first use.
    available: OnceCell<bool>,
}

impl RipgrepExecutor {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            available: OnceCell::new(),
        }
    }

    /// Command-line arguments for one search.
    pub fn build_args(pattern: &str, source: &SearchSource<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["--json", "--multiline", "--no-config"]
            .iter()
            .map(OsString::from)
            .collect();

        match source {
            SearchSource::Buffer(_) => {
                args.push("--regexp".into());
                args.push(pattern.into());
                args.push("-".into());
            }
            SearchSource::Directory { root, globs } => {
                args.push("--sort".into());
                args.push("path".into());
                for glob in effective_globs(globs) {
                    args.push("--glob".into());
                    args.push(glob.into());
                }
                for dir in IGNORED_DIRS {
                    args.push("--glob".into());
                    args.push(format!("!**/{}/**", dir).into());
                }
                args.push("--regexp".into());
                args.push(pattern.into());
                args.push(root.as_os_str().to_os_string());
            }
        }

        args
    }

    async fn probe(&self) -> bool {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match timeout(self.timeout, cmd.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(program = %self.program.display(), error = %e, "ripgrep not available");
                false
            }
            Err(_) => {
                debug!(program = %self.program.display(), "ripgrep version probe timed out");
                false
            }
        }
    }

    fn spawn_error(&self, err: std::io::Error) -> Error {
        match err.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                Error::SearchToolUnavailable(format!("{}: {}", self.program.display(), err))
            }
            _ => Error::SearchToolFailed {
                code: None,
                stderr: err.to_string(),
            },
        }
    }

    /// Run ripgrep; `Ok(None)` means it exited cleanly with no matches.
    ///
    /// The child is killed on drop, so timing out or cancelling (which drops
    /// the in-flight future) never leaves a process behind.
    async fn run(
        &self,
        args: Vec<OsString>,
        input: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!(program = %self.program.display(), ?args, "Spawning search process");
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let (Some(mut pipe), Some(input)) = (stdin, input) {
                match pipe.write_all(input.as_bytes()).await {
                    // rg may stop reading early
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
                // dropping the pipe closes the child's stdin
            }
            Ok(())
        };
        let finished = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output
        };

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = timeout(self.timeout, finished) => match result {
                Err(_) => {
                    return Err(Error::Timeout {
                        seconds: self.timeout.as_secs(),
                    })
                }
                Ok(Err(e)) => {
                    return Err(Error::SearchToolFailed {
                        code: None,
                        stderr: e.to_string(),
                    })
                }
                Ok(Ok(output)) => output,
            },
        };

        match output.status.code() {
            Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned())),
            Some(1) => Ok(None),
            code => Err(Error::SearchToolFailed {
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

impl Default for RipgrepExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_RG, Duration::from_secs(crate::DEFAULT_SEARCH_TIMEOUT_SECS))
    }
}

#[async_trait]
impl SearchExecutor for RipgrepExecutor {
    fn name(&self) -> &'static str {
        "ripgrep"
    }

    async fn is_available(&self) -> bool {
        *self.available.get_or_init(|| self.probe()).await
    }

    async fn execute(
        &self,
        pattern: &PatternEntry,
        source: &SearchSource<'_>,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome> {
        let args = Self::build_args(&pattern.pattern, source);
        let (input, buffer_search) = match source {
            SearchSource::Buffer(text) => (Some(*text), true),
            SearchSource::Directory { .. } => (None, false),
        };

        match self.run(args, input, cancel).await? {
            Some(stdout) => Ok(SearchOutcome::from_events(parse_ripgrep_events(
                &stdout,
                buffer_search,
            ))),
            None => Ok(SearchOutcome::NoMatches),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::patterns::build_patterns;
    use crate::types::{DefinitionKind, MatchOrigin};
    use std::path::Path;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_build_args_buffer() {
        let args = RipgrepExecutor::build_args("(?m)^foo", &SearchSource::Buffer("foo"));
        assert_eq!(
            strings(&args),
            vec!["--json", "--multiline", "--no-config", "--regexp", "(?m)^foo", "-"]
        );
    }

    #[test]
    fn test_build_args_directory_uses_default_glob() {
        let globs: Vec<String> = Vec::new();
        let args = RipgrepExecutor::build_args(
            "(?m)^foo",
            &SearchSource::Directory {
                root: Path::new("/ws"),
                globs: &globs,
            },
        );
        assert_eq!(
            strings(&args),
            vec![
                "--json",
                "--multiline",
                "--no-config",
                "--sort",
                "path",
                "--glob",
                "*.hs",
                "--glob",
                "!**/node_modules/**",
                "--glob",
                "!**/dist/**",
                "--glob",
                "!**/dist-newstyle/**",
                "--glob",
                "!**/target/**",
                "--glob",
                "!**/build/**",
                "--regexp",
                "(?m)^foo",
                "/ws",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let executor = RipgrepExecutor::new("/nonexistent/bin/rg-missing", Duration::from_secs(1));
        assert!(!executor.is_available().await);

        let pattern = build_patterns("foo").remove(0);
        let result = executor
            .execute(&pattern, &SearchSource::Buffer("foo :: Int"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::SearchToolUnavailable(_))));
    }

    #[tokio::test]
    async fn test_real_ripgrep_buffer_search() {
        let executor = RipgrepExecutor::default();
        if !executor.is_available().await {
            return;
        }

        let pattern = build_patterns("colonsNextLine")
            .into_iter()
            .find(|p| p.kind == DefinitionKind::SignatureNextLine)
            .unwrap();
        let text = "module M where\n\ncolonsNextLine\n  :: Int -> Int\ncolonsNextLine x = x\n";
        let events = executor
            .execute(&pattern, &SearchSource::Buffer(text), &CancellationToken::new())
            .await
            .unwrap()
            .into_events();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].origin, MatchOrigin::Buffer);
        assert_eq!(events[0].line_number, 3);
        assert!(events[0].text.starts_with("colonsNextLine\n"));
    }

    #[tokio::test]
    async fn test_real_ripgrep_no_matches() {
        let executor = RipgrepExecutor::default();
        if !executor.is_available().await {
            return;
        }

        let pattern = build_patterns("absent").remove(0);
        let outcome = executor
            .execute(&pattern, &SearchSource::Buffer("foo = 1\n"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, SearchOutcome::NoMatches);
    }

    #[tokio::test]
    async fn test_real_ripgrep_skips_build_directories() {
        let executor = RipgrepExecutor::default();
        if !executor.is_available().await {
            return;
        }

        let dir = tempfile::TempDir::new().unwrap();
        for sub in ["src", "dist-newstyle/build", "target"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
            std::fs::write(dir.path().join(sub).join("A.hs"), "foo = 1\n").unwrap();
        }

        let globs: Vec<String> = Vec::new();
        let pattern = build_patterns("foo")
            .into_iter()
            .find(|p| p.kind == DefinitionKind::Assignment)
            .unwrap();
        let source = SearchSource::Directory {
            root: dir.path(),
            globs: &globs,
        };
        let events = executor
            .execute(&pattern, &source, &CancellationToken::new())
            .await
            .unwrap()
            .into_events();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].origin, MatchOrigin::File(dir.path().join("src/A.hs")));
    }

    #[cfg(unix)]
    mod fake_engine {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("fake-rg");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_version_probe_runs_once() {
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("probes.log");
            let executor = RipgrepExecutor::new(
                script(&dir, &format!("echo probe >> '{}'\nexit 0", log.display())),
                Duration::from_secs(5),
            );

            assert!(executor.is_available().await);
            assert!(executor.is_available().await);
            assert!(executor.clone().is_available().await);
            assert_eq!(fs::read_to_string(&log).unwrap().lines().count(), 1);
        }

        #[tokio::test]
        async fn test_exit_one_is_no_matches() {
            let dir = TempDir::new().unwrap();
            let executor = RipgrepExecutor::new(script(&dir, "cat >/dev/null\nexit 1"), Duration::from_secs(5));
            let pattern = build_patterns("foo").remove(0);

            let outcome = executor
                .execute(&pattern, &SearchSource::Buffer("foo = 1\n"), &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(outcome, SearchOutcome::NoMatches);
        }

        #[tokio::test]
        async fn test_other_exit_is_tool_failure() {
            let dir = TempDir::new().unwrap();
            let executor = RipgrepExecutor::new(
                script(&dir, "cat >/dev/null\necho 'regex parse error' >&2\nexit 2"),
                Duration::from_secs(5),
            );
            let pattern = build_patterns("foo").remove(0);

            let result = executor
                .execute(&pattern, &SearchSource::Buffer("foo = 1\n"), &CancellationToken::new())
                .await;
            match result {
                Err(Error::SearchToolFailed { code, stderr }) => {
                    assert_eq!(code, Some(2));
                    assert_eq!(stderr, "regex parse error");
                }
                other => panic!("Expected tool failure, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_json_stream_is_decoded() {
            let dir = TempDir::new().unwrap();
            let body = r#"cat >/dev/null
echo '{"type":"begin","data":{"path":{"text":"<stdin>"}}}'
echo 'garbage'
echo '{"type":"match","data":{"path":{"text":"<stdin>"},"lines":{"text":"foo :: Int\n"},"line_number":2}}'
exit 0"#;
            let executor = RipgrepExecutor::new(script(&dir, body), Duration::from_secs(5));
            let pattern = build_patterns("foo").remove(0);

            let events = executor
                .execute(&pattern, &SearchSource::Buffer("x\nfoo :: Int\n"), &CancellationToken::new())
                .await
                .unwrap()
                .into_events();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].origin, MatchOrigin::Buffer);
            assert_eq!(events[0].line_number, 2);
        }

        #[tokio::test]
        async fn test_slow_engine_times_out() {
            let dir = TempDir::new().unwrap();
            let executor = RipgrepExecutor::new(script(&dir, "sleep 10"), Duration::from_millis(200));
            let pattern = build_patterns("foo").remove(0);

            let result = executor
                .execute(&pattern, &SearchSource::Buffer("foo = 1\n"), &CancellationToken::new())
                .await;
            assert!(matches!(result, Err(Error::Timeout { .. })));
        }

        #[tokio::test]
        async fn test_cancellation_aborts_search() {
            let dir = TempDir::new().unwrap();
            let executor = RipgrepExecutor::new(script(&dir, "sleep 10"), Duration::from_secs(30));
            let pattern = build_patterns("foo").remove(0);
            let cancel = CancellationToken::new();

            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                trigger.cancel();
            });

            let result = executor
                .execute(&pattern, &SearchSource::Buffer("foo = 1\n"), &cancel)
                .await;
            assert!(matches!(result, Err(Error::Cancelled)));
        }
    }
}

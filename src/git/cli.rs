use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::GitClient;
use crate::types::{ChangedFile, CommitInfo, FileChangeKind, GitError};

type Result<T> = std::result::Result<T, GitError>;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(8);

/// Talks to the `git` binary, one subprocess per query, rooted at the
/// repository under inspection. Every call carries a timeout and a timed-out
/// child is killed rather than left behind.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
    command_timeout: Duration,
    probe_timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            binary: "git".to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeouts(mut self, command: Duration, probe: Duration) -> Self {
        self.command_timeout = command;
        self.probe_timeout = probe;
        self
    }

    /// Fast probe used before detail queries: is `dir` inside a working
    /// tree at all?
    pub async fn is_work_tree(&self, dir: &Path) -> bool {
        matches!(
            self.run(dir, &["rev-parse", "--is-inside-work-tree"], self.probe_timeout)
                .await,
            Ok(out) if out.trim() == "true"
        )
    }

    async fn run(&self, dir: &Path, args: &[&str], timeout: Duration) -> Result<String> {
        let rendered = args.join(" ");
        debug!(dir = %dir.display(), command = %rendered, "running git");

        let output = tokio::time::timeout(
            timeout,
            Command::new(&self.binary)
                .args(args)
                .current_dir(dir)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| GitError::Timeout {
            command: rendered.clone(),
            timeout_ms: timeout.as_millis() as u64,
        })?
        .map_err(GitError::Spawn)?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: rendered,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl GitClient for GitCli {
    async fn status(&self, dir: &Path) -> Result<Vec<ChangedFile>> {
        let out = self
            .run(dir, &["status", "--porcelain"], self.command_timeout)
            .await?;
        Ok(parse_porcelain(&out))
    }

    async fn current_branch(&self, dir: &Path) -> Result<String> {
        match self
            .run(dir, &["rev-parse", "--abbrev-ref", "HEAD"], self.command_timeout)
            .await
        {
            Ok(out) => Ok(out.trim().to_string()),
            // An unborn branch has no commit for HEAD to resolve to, but
            // the symbolic ref still knows its name.
            Err(GitError::CommandFailed { .. }) => {
                let out = self
                    .run(dir, &["symbolic-ref", "--short", "HEAD"], self.command_timeout)
                    .await?;
                Ok(out.trim().to_string())
            }
            Err(err) => Err(err),
        }
    }

    async fn last_commit_subject(&self, dir: &Path) -> Result<Option<String>> {
        match self
            .run(dir, &["log", "-1", "--pretty=%s"], self.command_timeout)
            .await
        {
            Ok(out) => {
                let subject = out.trim();
                Ok((!subject.is_empty()).then(|| subject.to_string()))
            }
            Err(GitError::CommandFailed { stderr, .. }) if is_empty_history(&stderr) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn recent_commits(&self, dir: &Path, max: usize) -> Result<Vec<CommitInfo>> {
        let count = format!("-{}", max.max(1));
        match self
            .run(
                dir,
                &[
                    "log",
                    count.as_str(),
                    "--pretty=format:%h%x1f%s%x1f%an%x1f%ad",
                    "--date=iso",
                ],
                self.command_timeout,
            )
            .await
        {
            Ok(out) => Ok(parse_commits(&out)),
            Err(GitError::CommandFailed { stderr, .. }) if is_empty_history(&stderr) => {
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    async fn remote_url(&self, dir: &Path) -> Result<Option<String>> {
        match self
            .run(dir, &["remote", "get-url", "origin"], self.command_timeout)
            .await
        {
            Ok(out) => {
                let url = out.trim();
                Ok((!url.is_empty()).then(|| url.to_string()))
            }
            // No origin; fall back to whatever remote exists.
            Err(GitError::CommandFailed { .. }) => {
                let list = self.run(dir, &["remote"], self.command_timeout).await?;
                let Some(first) = list.lines().map(str::trim).find(|l| !l.is_empty()) else {
                    return Ok(None);
                };
                let out = self
                    .run(dir, &["remote", "get-url", first], self.command_timeout)
                    .await?;
                let url = out.trim();
                Ok((!url.is_empty()).then(|| url.to_string()))
            }
            Err(err) => Err(err),
        }
    }
}

fn is_empty_history(stderr: &str) -> bool {
    stderr.contains("does not have any commits")
        || stderr.contains("bad default revision")
        || stderr.contains("unknown revision")
}

/// One `git status --porcelain` line per changed path: a two-character
/// code, a space, then the path (with `orig -> target` for renames).
fn parse_porcelain(output: &str) -> Vec<ChangedFile> {
    output
        .lines()
        .filter_map(|line| {
            let code = line.get(0..2)?;
            let rest = line.get(3..)?.trim();
            if rest.is_empty() {
                return None;
            }
            let path = rest.split(" -> ").last().unwrap_or(rest);
            let path = path.trim_matches('"');
            Some(ChangedFile {
                path: path.to_string(),
                kind: kind_for(code),
            })
        })
        .collect()
}

fn kind_for(code: &str) -> FileChangeKind {
    if code.contains('A') {
        FileChangeKind::Added
    } else if code.contains('D') {
        FileChangeKind::Deleted
    } else {
        FileChangeKind::Modified
    }
}

fn parse_commits(output: &str) -> Vec<CommitInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\u{1f}');
            let id = parts.next()?.trim();
            if id.is_empty() {
                return None;
            }
            Some(CommitInfo {
                id: id.to_string(),
                message: parts.next().unwrap_or("").to_string(),
                author: parts.next().unwrap_or("").to_string(),
                time: parts.next().unwrap_or("").to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_porcelain_maps_codes_to_change_kinds() {
        let out = " M src/lib.rs\nA  src/new.rs\n D gone.rs\n?? notes.txt\n";
        let files = parse_porcelain(out);

        assert_eq!(files.len(), 4);
        assert_eq!(files[0].path, "src/lib.rs");
        assert_eq!(files[0].kind, FileChangeKind::Modified);
        assert_eq!(files[1].kind, FileChangeKind::Added);
        assert_eq!(files[2].kind, FileChangeKind::Deleted);
        // Untracked entries surface as modifications, same as the dashboard.
        assert_eq!(files[3].path, "notes.txt");
        assert_eq!(files[3].kind, FileChangeKind::Modified);
    }

    #[test]
    fn test_porcelain_rename_keeps_the_target_path() {
        let files = parse_porcelain("R  old_name.rs -> new_name.rs\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "new_name.rs");
    }

    #[test]
    fn test_porcelain_quoted_path_is_unquoted() {
        let files = parse_porcelain(" M \"with space.txt\"\n");
        assert_eq!(files[0].path, "with space.txt");
    }

    #[test]
    fn test_porcelain_ignores_garbage_lines() {
        assert!(parse_porcelain("\n\nx\n").is_empty());
    }

    #[test]
    fn test_commits_parse_unit_separated_fields() {
        let out = "abc1234\u{1f}Fix the walker\u{1f}Ada\u{1f}2026-08-01 10:00:00 +0200\n\
                   def5678\u{1f}Initial commit\u{1f}Grace\u{1f}2026-07-30 09:00:00 +0200";
        let commits = parse_commits(out);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id, "abc1234");
        assert_eq!(commits[0].message, "Fix the walker");
        assert_eq!(commits[0].author, "Ada");
        assert_eq!(commits[0].time, "2026-08-01 10:00:00 +0200");
    }

    #[test]
    fn test_empty_history_messages_are_recognized() {
        assert!(is_empty_history(
            "fatal: your current branch 'main' does not have any commits yet"
        ));
        assert!(is_empty_history(
            "fatal: ambiguous argument 'HEAD': unknown revision or path not in the working tree."
        ));
        assert!(!is_empty_history("fatal: not a git repository"));
    }

    #[tokio::test]
    async fn test_missing_binary_surfaces_as_spawn_error() {
        let git = GitCli::new().with_binary("rempo-test-no-such-binary");
        let err = git
            .status(Path::new("/"))
            .await
            .expect_err("spawn should fail");
        assert!(matches!(err, GitError::Spawn(_)));
    }

    proptest! {
        #[test]
        fn test_porcelain_parser_never_panics(input in "\\PC*") {
            let _ = parse_porcelain(&input);
        }

        #[test]
        fn test_commit_parser_never_panics(input in "\\PC*") {
            let _ = parse_commits(&input);
        }
    }
}

//! Files changed in the working tree, as reported by git.
//!
//! Best effort: a missing git binary, a directory outside a repository, or a
//! slow repository all produce an empty list.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

pub const GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracked files that differ from `HEAD` plus untracked, non-ignored files.
pub async fn changed_files(repo_dir: &Path) -> Vec<String> {
    let mut files = BTreeSet::new();
    for args in [
        &["diff", "--name-only", "HEAD"][..],
        &["ls-files", "--others", "--exclude-standard"][..],
    ] {
        if let Some(stdout) = run_git(repo_dir, args, GIT_TIMEOUT).await {
            files.extend(parse_name_list(&stdout));
        }
    }
    files.into_iter().collect()
}

async fn run_git(repo_dir: &Path, args: &[&str], timeout: Duration) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, output).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(output)) => {
            tracing::debug!(
                ?args,
                exit_code = output.status.code().unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git exited with failure"
            );
            None
        }
        Ok(Err(error)) => {
            tracing::debug!(?args, %error, "failed to run git");
            None
        }
        Err(_) => {
            tracing::debug!(?args, timeout_secs = timeout.as_secs(), "git timed out");
            None
        }
    }
}

/// One path per non-blank line.
pub fn parse_name_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

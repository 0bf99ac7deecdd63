//! Session context: which channel, session, branch, and project a call
//! acts on.
//!
//! The context is an immutable value passed into every store call. Switching
//! channels produces a new context rather than mutating a shared one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Channel used when no branch can be detected.
pub const DEFAULT_CHANNEL: &str = "general";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub project_root: PathBuf,
}

impl SessionContext {
    /// Build a context for `project_root`, deriving the channel from the
    /// checked-out git branch.
    pub fn detect(project_root: &Path) -> Self {
        let git_branch = current_branch(project_root);
        let channel = git_branch
            .as_deref()
            .map(channel_for_branch)
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
        let project_name = project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        debug!(
            branch = ?git_branch,
            channel = %channel,
            "Detected session context for {}",
            project_root.display()
        );

        Self {
            session_id: Uuid::new_v4().to_string(),
            channel,
            git_branch,
            project_name,
            project_root: project_root.to_path_buf(),
        }
    }

    /// A context with explicit values; no filesystem access.
    pub fn new(project_root: impl Into<PathBuf>, channel: impl Into<String>) -> Self {
        let project_root = project_root.into();
        let project_name = project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            session_id: Uuid::new_v4().to_string(),
            channel: channel.into(),
            git_branch: None,
            project_name,
            project_root,
        }
    }

    /// The same session, acting on a different channel.
    pub fn with_channel(&self, channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..self.clone()
        }
    }

    pub fn with_branch(&self, branch: Option<String>) -> Self {
        Self {
            git_branch: branch,
            ..self.clone()
        }
    }
}

/// Read the checked-out branch from `.git/HEAD`.
///
/// Returns `Some("detached")` for a detached HEAD and `None` outside a
/// repository. Worktrees (`.git` as a file) are followed one level.
pub fn current_branch(project_root: &Path) -> Option<String> {
    let git_path = project_root.join(".git");
    let git_dir = if git_path.is_file() {
        let pointer = std::fs::read_to_string(&git_path).ok()?;
        let dir = pointer.trim().strip_prefix("gitdir:")?.trim();
        let dir = PathBuf::from(dir);
        if dir.is_absolute() { dir } else { project_root.join(dir) }
    } else {
        git_path
    };

    let head = std::fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let head = head.trim();
    match head.strip_prefix("ref:") {
        Some(reference) => {
            let reference = reference.trim();
            Some(
                reference
                    .strip_prefix("refs/heads/")
                    .unwrap_or(reference)
                    .to_string(),
            )
        }
        None if !head.is_empty() => Some("detached".to_string()),
        None => None,
    }
}

/// Channel name for a branch: path separators become dashes.
pub fn channel_for_branch(branch: &str) -> String {
    let name: String = branch
        .trim()
        .chars()
        .map(|c| if c == '/' || c.is_whitespace() { '-' } else { c })
        .collect();
    if name.is_empty() {
        DEFAULT_CHANNEL.to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_names_become_channel_names() {
        assert_eq!(channel_for_branch("feature/auth-flow"), "feature-auth-flow");
        assert_eq!(channel_for_branch("main"), "main");
        assert_eq!(channel_for_branch("  "), DEFAULT_CHANNEL);
    }

    #[test]
    fn detects_branch_from_head_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/feature/login\n").unwrap();

        let ctx = SessionContext::detect(dir.path());
        assert_eq!(ctx.git_branch.as_deref(), Some("feature/login"));
        assert_eq!(ctx.channel, "feature-login");
        assert!(!ctx.session_id.is_empty());
    }

    #[test]
    fn detached_head_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "3f2a9c0d1e\n").unwrap();
        assert_eq!(current_branch(dir.path()).as_deref(), Some("detached"));
    }

    #[test]
    fn no_repository_falls_back_to_general() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::detect(dir.path());
        assert_eq!(ctx.git_branch, None);
        assert_eq!(ctx.channel, DEFAULT_CHANNEL);
    }

    #[test]
    fn with_channel_leaves_original_untouched() {
        let ctx = SessionContext::new("/tmp/project", "main");
        let switched = ctx.with_channel("release");
        assert_eq!(ctx.channel, "main");
        assert_eq!(switched.channel, "release");
        assert_eq!(switched.session_id, ctx.session_id);
        assert_eq!(switched.project_name.as_deref(), Some("project"));
    }
}

//! Per-submission scratch directory

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::core::utils::{random_token, BASE_NAME_LEN};

/// Placeholder replaced with `workDir/baseName`
pub const FILENAME_PLACEHOLDER: &str = "{filename}";
/// Placeholder replaced with the workspace directory
pub const WORKDIR_PLACEHOLDER: &str = "{workdir}";
/// Placeholder replaced with the base name alone
pub const BASENAME_PLACEHOLDER: &str = "{basename}";

/// Single-use scratch directory owning the source, the compiled artifact, the
/// compile log and the per-checkpoint outputs of one task.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
    base_name: String,
}

impl Workspace {
    /// Allocate a workspace under `root` for a submission.
    ///
    /// Nothing is created on disk until the preprocessor runs.
    pub fn new(root: impl AsRef<Path>, submission_id: i64) -> Self {
        Self::with_base_name(root, submission_id, random_token(BASE_NAME_LEN))
    }

    pub fn with_base_name(
        root: impl AsRef<Path>,
        submission_id: i64,
        base_name: impl Into<String>,
    ) -> Self {
        let base_name = base_name.into();
        let dir = root
            .as_ref()
            .join(format!("judge-{}-{}", submission_id, base_name));
        Self { dir, base_name }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// `workDir/baseName`, the value substituted for `{filename}`
    pub fn file_stem(&self) -> PathBuf {
        self.dir.join(&self.base_name)
    }

    pub fn source_path(&self, extension: &str) -> PathBuf {
        if extension.is_empty() {
            self.file_stem()
        } else {
            self.dir.join(format!("{}.{}", self.base_name, extension))
        }
    }

    pub fn compile_log_path(&self) -> PathBuf {
        self.dir.join(format!("{}-compile.log", self.base_name))
    }

    /// Where the program's output for a checkpoint is written
    pub fn output_path(&self, checkpoint_id: i64) -> PathBuf {
        self.dir.join(format!("output#{}.txt", checkpoint_id))
    }

    /// Substitute the workspace placeholders in a command template
    pub fn render(&self, template: &str) -> String {
        template
            .replace(FILENAME_PLACEHOLDER, &self.file_stem().to_string_lossy())
            .replace(WORKDIR_PLACEHOLDER, &self.dir.to_string_lossy())
            .replace(BASENAME_PLACEHOLDER, &self.base_name)
    }

    /// Recursively delete the workspace. Errors are logged, never returned.
    pub async fn cleanup(&self) {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!("Removed workspace {:?}", self.dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove workspace {:?}: {}", self.dir, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_paths() {
        let ws = Workspace::with_base_name("/tmp/work", 42, "AbCdEfGhIjKl");

        assert_eq!(ws.dir(), Path::new("/tmp/work/judge-42-AbCdEfGhIjKl"));
        assert_eq!(
            ws.source_path("cpp"),
            PathBuf::from("/tmp/work/judge-42-AbCdEfGhIjKl/AbCdEfGhIjKl.cpp")
        );
        assert_eq!(
            ws.compile_log_path(),
            PathBuf::from("/tmp/work/judge-42-AbCdEfGhIjKl/AbCdEfGhIjKl-compile.log")
        );
        assert_eq!(
            ws.output_path(7),
            PathBuf::from("/tmp/work/judge-42-AbCdEfGhIjKl/output#7.txt")
        );
    }

    #[test]
    fn test_render_substitutes_every_placeholder() {
        let ws = Workspace::with_base_name("/w", 1, "Token");

        assert_eq!(
            ws.render("g++ -o {filename}.exe {filename}.cpp"),
            "g++ -o /w/judge-1-Token/Token.exe /w/judge-1-Token/Token.cpp"
        );
        assert_eq!(
            ws.render("java -cp {workdir} {basename}"),
            "java -cp /w/judge-1-Token Token"
        );
    }

    #[test]
    fn test_tokens_differ_between_workspaces() {
        let a = Workspace::new("/w", 1);
        let b = Workspace::new("/w", 1);
        assert_ne!(a.dir(), b.dir());
    }

    #[tokio::test]
    async fn test_cleanup_removes_tree_and_tolerates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::with_base_name(root.path(), 5, "Base");
        fs::create_dir_all(ws.dir().join("nested")).await.unwrap();
        fs::write(ws.output_path(1), "out").await.unwrap();

        ws.cleanup().await;
        assert!(!ws.dir().exists());

        // second cleanup is a no-op
        ws.cleanup().await;
    }
}

//! Preprocessor - materializes source code and checkpoint fixtures on disk

use std::borrow::Cow;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{JudgeError, JudgeResult};
use crate::models::{JudgeTask, Language};
use crate::registry::Registry;
use crate::workspace::{Workspace, FILENAME_PLACEHOLDER};

/// Per-problem cache of checkpoint input/answer files
#[derive(Debug, Clone)]
pub struct FixtureCache {
    root: PathBuf,
}

impl FixtureCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn problem_dir(&self, problem_id: i64) -> PathBuf {
        self.root.join(problem_id.to_string())
    }

    pub fn input_path(&self, problem_id: i64, checkpoint_id: i64) -> PathBuf {
        self.problem_dir(problem_id)
            .join(format!("input#{}.txt", checkpoint_id))
    }

    /// Expected output of a checkpoint
    pub fn answer_path(&self, problem_id: i64, checkpoint_id: i64) -> PathBuf {
        self.problem_dir(problem_id)
            .join(format!("output#{}.txt", checkpoint_id))
    }
}

pub struct Preprocessor {
    registry: Arc<dyn Registry>,
    fixtures: FixtureCache,
}

impl Preprocessor {
    pub fn new(registry: Arc<dyn Registry>, fixtures: FixtureCache) -> Self {
        Self { registry, fixtures }
    }

    pub fn fixtures(&self) -> &FixtureCache {
        &self.fixtures
    }

    /// Create the workspace directory and write the submitted source into it.
    ///
    /// Returns the path of the written source file.
    pub async fn create_test_code(
        &self,
        task: &JudgeTask,
        workspace: &Workspace,
    ) -> JudgeResult<PathBuf> {
        create_directory(workspace.dir()).await?;
        open_permissions(workspace.dir()).await?;

        let language = &task.language;
        let code = replace_class_name(language, &task.submission.code, workspace.base_name());
        let source_path =
            workspace.source_path(source_extension(&language.compile_command));

        fs::write(&source_path, code.as_bytes()).await?;
        debug!(
            "[Submission #{}] Source written to {:?}",
            task.submission_id(),
            source_path
        );

        Ok(source_path)
    }

    /// (Re)write the input and answer files of every checkpoint of a problem.
    ///
    /// Existing files are always overwritten. Returns the number of checkpoints.
    pub async fn fetch_test_points(&self, problem_id: i64) -> JudgeResult<usize> {
        let problem_dir = self.fixtures.problem_dir(problem_id);
        create_directory(&problem_dir).await?;

        let checkpoints = self
            .registry
            .checkpoints(problem_id)
            .await
            .map_err(JudgeError::Registry)?;

        for checkpoint in &checkpoints {
            let id = checkpoint.checkpoint_id;
            fs::write(self.fixtures.input_path(problem_id, id), &checkpoint.input).await?;
            fs::write(self.fixtures.answer_path(problem_id, id), &checkpoint.output).await?;
        }

        info!(
            "Fetched {} checkpoints of problem #{} into {:?}",
            checkpoints.len(),
            problem_id,
            problem_dir
        );
        Ok(checkpoints.len())
    }
}

async fn create_directory(path: &Path) -> JudgeResult<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| JudgeError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })
}

/// The program is compiled and run by a less privileged user
async fn open_permissions(path: &Path) -> JudgeResult<()> {
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o777)).await?;
    Ok(())
}

/// Rename the language's fixed entry class to the workspace base name
pub fn replace_class_name<'a>(language: &Language, code: &'a str, new_name: &str) -> Cow<'a, str> {
    lazy_static! {
        static ref CLASS_DECLARATION: Regex = Regex::new(r"class[ \n]+(\w+)").unwrap();
    }

    let Some(main_class) = language.main_class.as_deref() else {
        return Cow::Borrowed(code);
    };

    CLASS_DECLARATION.replace_all(code, |caps: &Captures| {
        if &caps[1] == main_class {
            format!("class {}", new_name)
        } else {
            caps[0].to_string()
        }
    })
}

/// Source file extension, read from the compile command template.
///
/// It is the token following `{filename}.` up to the next whitespace, cut
/// before any `exe` so `{filename}.exe` outputs are skipped. Empty if the
/// template names no source file.
pub fn source_extension(compile_command: &str) -> &str {
    let marker = format!("{}.", FILENAME_PLACEHOLDER);

    compile_command
        .match_indices(marker.as_str())
        .find_map(|(idx, _)| {
            let rest = &compile_command[idx + marker.len()..];
            let token = &rest[..rest.find(char::is_whitespace).unwrap_or(rest.len())];
            let extension = &token[..token.find("exe").unwrap_or(token.len())];
            (!extension.is_empty()).then_some(extension)
        })
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Checkpoint, Problem, Submission};
    use crate::registry::Catalog;

    fn language(compile_command: &str, main_class: Option<&str>) -> Language {
        Language {
            language_id: 1,
            name: "Test".into(),
            compile_command: compile_command.into(),
            run_command: "{filename}.exe".into(),
            extended_time_limit: false,
            main_class: main_class.map(String::from),
        }
    }

    fn task(language: Language, code: &str) -> JudgeTask {
        JudgeTask {
            submission: Submission {
                submission_id: 1,
                problem_id: 1000,
                language_id: language.language_id,
                code: code.into(),
            },
            language,
            problem: Problem {
                problem_id: 1000,
                time_limit: 1000,
                memory_limit: 65536,
                code: None,
            },
        }
    }

    #[test]
    fn test_source_extension() {
        assert_eq!(
            source_extension("g++ -O2 -o {filename}.exe {filename}.cpp -lm"),
            "cpp"
        );
        assert_eq!(source_extension("gcc {filename}.c -o {filename}.exe"), "c");
        assert_eq!(source_extension("javac {filename}.java"), "java");
        assert_eq!(source_extension("python3 -m py_compile {filename}.py"), "py");
        assert_eq!(source_extension("make {filename}"), "");
        assert_eq!(source_extension("cc -o {filename}.exe"), "");
    }

    #[test]
    fn test_replace_class_name() {
        let java = language("javac {filename}.java", Some("Main"));
        let code = "public class Main {\n}\nclass\nMain2 {}\nclass  Main{}";

        assert_eq!(
            replace_class_name(&java, code, "Token"),
            "public class Token {\n}\nclass\nMain2 {}\nclass Token{}"
        );

        let c = language("gcc {filename}.c", None);
        assert!(matches!(
            replace_class_name(&c, "class Main", "Token"),
            Cow::Borrowed(_)
        ));
    }

    #[tokio::test]
    async fn test_create_test_code() {
        let root = tempfile::tempdir().unwrap();
        let preprocessor = Preprocessor::new(
            Arc::new(Catalog::default()),
            FixtureCache::new(root.path().join("checkpoints")),
        );
        let workspace = Workspace::with_base_name(root.path().join("work"), 1, "Token");
        let task = task(
            language("javac {filename}.java", Some("Main")),
            "public class Main {}",
        );

        let source = preprocessor.create_test_code(&task, &workspace).await.unwrap();

        assert_eq!(source, workspace.dir().join("Token.java"));
        assert_eq!(
            fs::read_to_string(&source).await.unwrap(),
            "public class Token {}"
        );

        let mode = std::fs::metadata(workspace.dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }

    #[tokio::test]
    async fn test_create_test_code_reports_directory_failure() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let preprocessor = Preprocessor::new(
            Arc::new(Catalog::default()),
            FixtureCache::new(root.path()),
        );
        let workspace = Workspace::with_base_name(&blocker, 1, "Token");
        let task = task(language("gcc {filename}.c", None), "int main(){}");

        let err = preprocessor
            .create_test_code(&task, &workspace)
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::CreateDirectory { .. }));
    }

    #[tokio::test]
    async fn test_fetch_test_points_reports_directory_failure() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("checkpoints");
        std::fs::write(&blocker, "not a directory").unwrap();

        let preprocessor = Preprocessor::new(
            Arc::new(Catalog::default()),
            FixtureCache::new(&blocker),
        );

        let err = preprocessor.fetch_test_points(1000).await.unwrap_err();
        match err {
            JudgeError::CreateDirectory { path, .. } => assert_eq!(path, blocker.join("1000")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_test_points_overwrites_fixtures() {
        let root = tempfile::tempdir().unwrap();
        let catalog = Catalog {
            checkpoints: vec![Checkpoint {
                checkpoint_id: 7,
                problem_id: 1000,
                checkpoint_number: 1,
                input: "1 2\n".into(),
                output: "3\n".into(),
            }],
            ..Default::default()
        };
        let fixtures = FixtureCache::new(root.path());
        let preprocessor = Preprocessor::new(Arc::new(catalog), fixtures.clone());

        std::fs::create_dir_all(fixtures.problem_dir(1000)).unwrap();
        std::fs::write(fixtures.answer_path(1000, 7), "stale").unwrap();

        assert_eq!(preprocessor.fetch_test_points(1000).await.unwrap(), 1);
        assert_eq!(
            std::fs::read_to_string(fixtures.input_path(1000, 7)).unwrap(),
            "1 2\n"
        );
        assert_eq!(
            std::fs::read_to_string(fixtures.answer_path(1000, 7)).unwrap(),
            "3\n"
        );
        assert_eq!(
            fixtures.input_path(1000, 7),
            root.path().join("1000").join("input#7.txt")
        );
    }
}

//! ビルド対象コミットのタグ

use crate::error::{Result, TaskError};
use std::path::PathBuf;
use std::process::Command;

/// コミットを指すタグを調べる
pub trait SourceTagProvider: Send + Sync {
    fn tags_at(&self, commit: &str) -> Result<Vec<String>>;
}

/// ローカルクローンで `git tag --points-at <commit>` を実行
#[derive(Debug, Clone, Default)]
pub struct GitTags {
    repository: Option<PathBuf>,
}

impl GitTags {
    pub fn new(repository: Option<PathBuf>) -> Self {
        Self { repository }
    }
}

impl SourceTagProvider for GitTags {
    fn tags_at(&self, commit: &str) -> Result<Vec<String>> {
        let git = which::which("git").map_err(|_| TaskError::ToolNotFound {
            tool: "git".to_string(),
        })?;

        let mut cmd = Command::new(git);
        cmd.args(["tag", "--points-at", commit]);
        if let Some(dir) = &self.repository {
            cmd.current_dir(dir);
        }

        tracing::debug!("Running: git tag --points-at {}", commit);
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(TaskError::Command {
                tool: "git tag".to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr_tail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_tag_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_tag_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// チェックアウト元のリポジトリプロバイダに応じたソースタグ
///
/// Git 系のプロバイダだけ問い合わせ、それ以外は空を返す。
pub fn source_tags(
    provider: Option<&str>,
    commit: Option<&str>,
    tags: &dyn SourceTagProvider,
) -> Result<Vec<String>> {
    let commit = commit.filter(|c| !c.is_empty()).ok_or_else(|| {
        TaskError::Configuration(
            "Cannot retrieve source tags because Build.SourceVersion is not set.".to_string(),
        )
    })?;

    match provider {
        Some("TfsGit" | "GitHub" | "Git") => tags.tags_at(commit),
        other => {
            tracing::debug!("Source provider {:?} has no tag support", other);
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTags(Vec<&'static str>);

    impl SourceTagProvider for FixedTags {
        fn tags_at(&self, commit: &str) -> Result<Vec<String>> {
            assert_eq!(commit, "abc123");
            Ok(self.0.iter().map(|t| t.to_string()).collect())
        }
    }

    #[test]
    fn test_git_providers_query_tags() {
        let provider = FixedTags(vec!["v1.0", "release"]);
        for name in ["TfsGit", "GitHub", "Git"] {
            assert_eq!(
                source_tags(Some(name), Some("abc123"), &provider).unwrap(),
                vec!["v1.0", "release"]
            );
        }
    }

    #[test]
    fn test_other_providers_have_no_tags() {
        let provider = FixedTags(vec!["v1.0"]);
        assert!(source_tags(Some("TfsVersionControl"), Some("abc123"), &provider)
            .unwrap()
            .is_empty());
        assert!(source_tags(None, Some("abc123"), &provider).unwrap().is_empty());
    }

    #[test]
    fn test_missing_commit_is_configuration_error() {
        let provider = FixedTags(Vec::new());
        let err = source_tags(Some("Git"), None, &provider).unwrap_err();
        assert!(matches!(err, TaskError::Configuration(m) if m.contains("Build.SourceVersion")));
    }

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(parse_tag_list("v1\n\n v2 \n"), vec!["v1", "v2"]);
        assert!(parse_tag_list("").is_empty());
    }
}

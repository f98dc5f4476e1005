use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Invalid task configuration: {0}")]
    Configuration(String),

    #[error("Cannot provision daemon credentials: {0}")]
    Credential(String),

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Login failed: {0}")]
    Authentication(String),

    #[error("{tool} exited with code {exit_code}: {stderr_tail}")]
    Command {
        tool: String,
        exit_code: i32,
        stderr_tail: String,
    },

    #[error("{tool} not found in PATH")]
    ToolNotFound { tool: String },

    #[error("Step {} of {total} ({step}) failed after {completed} succeeded: {source}", .completed + 1)]
    Sequence {
        completed: usize,
        total: usize,
        step: String,
        #[source]
        source: Box<TaskError>,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskError {
    /// Sequence のラップを外した、タスクを止めた元のエラー
    pub fn root(&self) -> &TaskError {
        match self {
            TaskError::Sequence { source, .. } => source.root(),
            other => other,
        }
    }

    /// ホストに失敗として報告する 1 行メッセージ
    pub fn user_message(&self) -> String {
        match self.root() {
            TaskError::Command { stderr_tail, .. } if !stderr_tail.is_empty() => stderr_tail
                .lines()
                .last()
                .unwrap_or(stderr_tail)
                .to_string(),
            _ => self.to_string(),
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<dockflow_config::ConfigError> for TaskError {
    fn from(err: dockflow_config::ConfigError) -> Self {
        TaskError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;

//! [`Session`] 上の docker-compose
//!
//! [`ComposeSession`] はセッションを包み、compose ファイル群・プロジェクト名・
//! compose ファイルが参照する変数を加えます。証明書とログインの寿命は
//! 内側のセッションが持ちます。

use crate::command::{Tool, ToolCommand};
use crate::error::{Result, TaskError};
use crate::session::Session;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

pub struct ComposeSession {
    session: Session,
    files: Vec<PathBuf>,
    project_name: Option<String>,
    file_args: Vec<(String, String)>,
}

impl ComposeSession {
    /// 相対パスの `additional_files` は主ファイルのディレクトリから解決し、
    /// 存在しないものは読み飛ばす。
    pub fn new(
        session: Session,
        compose_file: PathBuf,
        additional_files: &[String],
        project_name: Option<String>,
        file_args: Vec<(String, String)>,
    ) -> Self {
        let base = compose_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut files = vec![compose_file];
        for file in additional_files {
            let path = Path::new(file);
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            };
            if path.exists() {
                files.push(path);
            } else {
                tracing::debug!("Skipping missing compose file {}", path.display());
            }
        }

        Self {
            session,
            files,
            project_name: project_name.filter(|p| !p.is_empty()),
            file_args,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `docker-compose <auth> -f <file>... [-p <project>] <args>`
    ///
    /// ファイル引数はこのサブプロセスの環境変数としてだけ渡す。
    pub fn compose_command<S: AsRef<str>>(&self, args: &[S]) -> ToolCommand {
        let mut argv = self.session.builder().auth_flags();
        for file in &self.files {
            argv.push("-f".to_string());
            argv.push(file.display().to_string());
        }
        if let Some(project) = &self.project_name {
            argv.push("-p".to_string());
            argv.push(project.clone());
        }
        argv.extend(args.iter().map(|a| a.as_ref().to_string()));
        ToolCommand::new(Tool::Compose, argv).envs(&self.file_args)
    }

    /// 全 compose ファイルをマージした設定
    pub async fn combined_config(&self) -> Result<String> {
        let command = self.compose_command(&["config"]).silent();
        let output = self.session.executor().exec(&command).await?;
        Ok(output.stdout)
    }

    /// `build` を持つサービスの `(service, image)`
    pub async fn built_images(&self) -> Result<Vec<(String, String)>> {
        service_images(&self.combined_config().await?, true)
    }

    /// `image` を持つサービスの `(service, image)`
    pub async fn images(&self) -> Result<Vec<(String, String)>> {
        service_images(&self.combined_config().await?, false)
    }

    pub fn close(&mut self) {
        self.session.close();
    }
}

/// `KEY=VALUE` 行を最初の `=` で分割
pub fn parse_file_args(lines: &[String]) -> Result<Vec<(String, String)>> {
    lines
        .iter()
        .map(|line| match line.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                tracing::debug!("Compose variable {}", key.trim());
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(TaskError::Configuration(format!(
                "Environment variable '{}' is invalid.",
                line
            ))),
        })
        .collect()
}

fn service_images(config: &str, built_only: bool) -> Result<Vec<(String, String)>> {
    let doc: Value = serde_yaml::from_str(config)?;
    let Some(services) = doc.get("services").and_then(Value::as_mapping) else {
        return Ok(Vec::new());
    };

    let mut images = Vec::new();
    for (name, service) in services {
        let Some(name) = name.as_str() else {
            continue;
        };
        let image = service.get("image").and_then(Value::as_str);

        if built_only {
            if service.get("build").is_none() {
                continue;
            }
            let image = image.ok_or_else(|| {
                TaskError::Configuration(format!("Missing image name for service '{}'.", name))
            })?;
            images.push((name.to_string(), image.to_string()));
        } else if let Some(image) = image {
            images.push((name.to_string(), image.to_string()));
        }
    }
    Ok(images)
}

/// 各サービスを `image@digest` に固定した compose ファイルを書き出す
pub fn write_digest_compose_file(path: &Path, pinned: &[(String, String)]) -> Result<()> {
    let mut services = Mapping::new();
    for (service, reference) in pinned {
        let mut entry = Mapping::new();
        entry.insert(Value::from("image"), Value::from(reference.as_str()));
        services.insert(Value::from(service.as_str()), Value::Mapping(entry));
    }

    let mut doc = Mapping::new();
    doc.insert(Value::from("version"), Value::from("2"));
    doc.insert(Value::from("services"), Value::Mapping(services));

    let yaml = serde_yaml::to_string(&doc)?;
    std::fs::write(path, yaml).map_err(|e| TaskError::filesystem(path, e))?;
    tracing::info!("Wrote image digests to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialProvisioner;
    use crate::endpoint::DaemonEndpoint;
    use crate::executor::{CommandOutput, ScriptedExecutor};
    use std::collections::HashMap;
    use std::sync::Arc;

    const CONFIG: &str = r#"
version: "3"
services:
  web:
    build: ./web
    image: myreg.io/web:v1
  worker:
    build: ./worker
    image: worker
  redis:
    image: redis:7
  sidecar:
    command: sleep
"#;

    fn local_session(executor: Arc<ScriptedExecutor>, root: &Path) -> Session {
        Session::open(executor, &CredentialProvisioner::new(root), None, None).unwrap()
    }

    fn config_executor(config: &'static str) -> Arc<ScriptedExecutor> {
        Arc::new(ScriptedExecutor::new(move |command| {
            if command.args.last().map(String::as_str) == Some("config") {
                Ok(CommandOutput::success(config))
            } else {
                Ok(CommandOutput::success(""))
            }
        }))
    }

    #[test]
    fn test_compose_command_shape() {
        let temp_dir = tempfile::tempdir().unwrap();
        let primary = temp_dir.path().join("docker-compose.yml");
        std::fs::write(temp_dir.path().join("override.yml"), "").unwrap();

        let executor = Arc::new(ScriptedExecutor::succeeding());
        let daemon = DaemonEndpoint::new(
            "tcp://host:2376",
            HashMap::from([
                ("cacert".to_string(), "CA".to_string()),
                ("cert".to_string(), "CERT".to_string()),
                ("key".to_string(), "KEY".to_string()),
            ]),
        );
        let session = Session::open(
            executor,
            &CredentialProvisioner::new(temp_dir.path()),
            Some(&daemon),
            None,
        )
        .unwrap();

        let compose = ComposeSession::new(
            session,
            primary.clone(),
            &["override.yml".to_string(), "missing.yml".to_string()],
            Some("proj".to_string()),
            vec![("TAG".to_string(), "v1".to_string())],
        );
        let command = compose.compose_command(&["up", "-d"]);

        assert_eq!(command.tool, Tool::Compose);
        assert_eq!(&command.args[..3], ["-H", "tcp://host:2376", "--tls"]);
        let rest: Vec<String> = command.args[6..].to_vec();
        assert_eq!(
            rest,
            vec![
                "-f".to_string(),
                primary.display().to_string(),
                "-f".to_string(),
                temp_dir.path().join("override.yml").display().to_string(),
                "-p".to_string(),
                "proj".to_string(),
                "up".to_string(),
                "-d".to_string(),
            ]
        );
        assert_eq!(command.env, vec![("TAG".to_string(), "v1".to_string())]);
        assert_eq!(command.label(), "docker-compose up");
    }

    #[tokio::test]
    async fn test_built_images_in_service_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = config_executor(CONFIG);
        let compose = ComposeSession::new(
            local_session(executor.clone(), temp_dir.path()),
            PathBuf::from("docker-compose.yml"),
            &[],
            None,
            Vec::new(),
        );

        assert_eq!(
            compose.built_images().await.unwrap(),
            vec![
                ("web".to_string(), "myreg.io/web:v1".to_string()),
                ("worker".to_string(), "worker".to_string()),
            ]
        );
        assert_eq!(
            compose.images().await.unwrap(),
            vec![
                ("web".to_string(), "myreg.io/web:v1".to_string()),
                ("worker".to_string(), "worker".to_string()),
                ("redis".to_string(), "redis:7".to_string()),
            ]
        );

        let config_call = &executor.calls()[0];
        assert!(config_call.silent);
        assert_eq!(config_call.args, vec!["-f", "docker-compose.yml", "config"]);
    }

    #[tokio::test]
    async fn test_built_service_without_image_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let compose = ComposeSession::new(
            local_session(
                config_executor("services:\n  api:\n    build: .\n"),
                temp_dir.path(),
            ),
            PathBuf::from("docker-compose.yml"),
            &[],
            None,
            Vec::new(),
        );

        let err = compose.built_images().await.unwrap_err();
        assert!(matches!(err, TaskError::Configuration(m) if m.contains("'api'")));
    }

    #[test]
    fn test_parse_file_args() {
        let lines = vec!["TAG = v1".to_string(), "URL=http://x/?a=b".to_string()];
        assert_eq!(
            parse_file_args(&lines).unwrap(),
            vec![
                ("TAG".to_string(), "v1".to_string()),
                ("URL".to_string(), "http://x/?a=b".to_string()),
            ]
        );

        let err = parse_file_args(&["NOVALUE".to_string()]).unwrap_err();
        assert!(matches!(err, TaskError::Configuration(m) if m.contains("NOVALUE")));
    }

    #[test]
    fn test_write_digest_compose_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("digests.yml");

        write_digest_compose_file(
            &path,
            &[
                ("web".to_string(), "myreg.io/web@sha256:aa".to_string()),
                ("db".to_string(), "postgres@sha256:bb".to_string()),
            ],
        )
        .unwrap();

        let doc: Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["version"].as_str(), Some("2"));
        let services = doc["services"].as_mapping().unwrap();
        let names: Vec<&str> = services.keys().filter_map(Value::as_str).collect();
        assert_eq!(names, vec!["web", "db"]);
        assert_eq!(doc["services"]["db"]["image"].as_str(), Some("postgres@sha256:bb"));
    }
}

//! タスク実行 1 回分の接続ライフタイム
//!
//! [`Session`] は Docker に対する全操作を囲みます。`open` でデーモン用の
//! 証明書を配置してレジストリにログインし、`close` でログアウトと証明書の
//! 削除を行います。`close` は失敗せず、実行されるのは一度だけです。
//! close されずに drop された場合も close が走ります。

use crate::command::{CommandBuilder, DaemonAuth, DockerCommand, ToolCommand};
use crate::credentials::{CredentialBundle, CredentialProvisioner};
use crate::endpoint::{DaemonEndpoint, RegistryEndpoint};
use crate::error::{Result, TaskError};
use crate::executor::{CommandOutput, Executor};
use crate::image::has_registry_component;
use std::sync::Arc;

pub struct Session {
    executor: Arc<dyn Executor>,
    builder: CommandBuilder,
    credentials: Option<CredentialBundle>,
    registry: Option<RegistryEndpoint>,
    logged_in: bool,
    closed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("daemon", &self.builder.auth().map(|a| a.url.as_str()))
            .field("registry", &self.registry.as_ref().map(|r| r.registry.as_str()))
            .field("logged_in", &self.logged_in)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Session {
    /// リモートデーモン（任意）とレジストリ（任意）に接続
    ///
    /// ログインは同期実行。失敗した場合は配置済みの証明書を削除してから
    /// エラーを返す。docker が見つからない場合は `ToolNotFound` のまま返す。
    pub fn open(
        executor: Arc<dyn Executor>,
        provisioner: &CredentialProvisioner,
        daemon: Option<&DaemonEndpoint>,
        registry: Option<RegistryEndpoint>,
    ) -> Result<Self> {
        let mut session = Self {
            executor,
            builder: CommandBuilder::default(),
            credentials: None,
            registry: None,
            logged_in: false,
            closed: false,
        };

        if let Some(daemon) = daemon {
            let bundle = provisioner.provision(daemon)?;
            session.builder = CommandBuilder::new(Some(DaemonAuth {
                url: daemon.url().to_string(),
                ca_path: bundle.ca_path().to_path_buf(),
                cert_path: bundle.cert_path().to_path_buf(),
                key_path: bundle.key_path().to_path_buf(),
            }));
            session.credentials = Some(bundle);
            tracing::debug!("Using Docker host {}", daemon.url());
        }

        if let Some(registry) = registry {
            let login = session.builder.build(&DockerCommand::Login {
                username: registry.username.clone(),
                password: registry.password.clone(),
                registry: Some(registry.registry.clone()),
            })?;

            match session.executor.exec_blocking(&login) {
                Ok(_) => {}
                Err(e @ TaskError::ToolNotFound { .. }) => {
                    session.close();
                    return Err(e);
                }
                Err(e) => {
                    session.close();
                    return Err(TaskError::Authentication(format!(
                        "{}: {}",
                        registry.hostname(),
                        e.user_message()
                    )));
                }
            }

            tracing::debug!("Logged into {}", registry.hostname());
            session.logged_in = true;
            session.registry = Some(registry);
        }

        Ok(session)
    }

    /// このセッションのデーモン認証を持つ CommandBuilder
    pub fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// 認証フラグ付きのコマンドを作成
    pub fn create_command(&self, command: &DockerCommand) -> Result<ToolCommand> {
        self.builder.build(command)
    }

    pub async fn exec(&self, command: &DockerCommand) -> Result<CommandOutput> {
        let command = self.create_command(command)?;
        self.executor.exec(&command).await
    }

    pub async fn exec_with(
        &self,
        command: &DockerCommand,
        listener: &mut (dyn for<'l> FnMut(&'l str) + Send),
    ) -> Result<CommandOutput> {
        let command = self.create_command(command)?;
        self.executor.exec_with(&command, Some(listener)).await
    }

    /// レジストリ部分を持たないイメージ名にログイン先のホストを付与
    ///
    /// Docker Hub の場合はそのまま返す。
    pub fn qualify_image_name(&self, image: &str) -> String {
        match &self.registry {
            Some(registry) if !has_registry_component(image) && !registry.is_docker_hub() => {
                let host = registry.hostname();
                if host.is_empty() {
                    image.to_string()
                } else {
                    format!("{}/{}", host, image)
                }
            }
            _ => image.to_string(),
        }
    }

    /// ログアウトして証明書を削除
    ///
    /// 失敗はログに出すだけで返さない。2 回目以降の呼び出しは何もしない。
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if self.logged_in {
            self.logged_in = false;
            match self.builder.build(&DockerCommand::Logout) {
                Ok(logout) => {
                    if let Err(e) = self.executor.exec_blocking(&logout) {
                        tracing::warn!("docker logout failed: {}", e);
                    }
                }
                Err(e) => tracing::warn!("docker logout skipped: {}", e),
            }
        }

        if let Some(mut bundle) = self.credentials.take()
            && let Err(e) = bundle.dispose()
        {
            tracing::warn!("Failed to remove daemon credentials: {}", e);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            tracing::debug!("Session dropped without close; cleaning up");
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScriptedExecutor;
    use std::collections::HashMap;
    use std::path::Path;

    fn daemon(params: &[(&str, &str)]) -> DaemonEndpoint {
        DaemonEndpoint::new(
            "tcp://build-host:2376/",
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn full_daemon() -> DaemonEndpoint {
        daemon(&[("cacert", "CA"), ("cert", "CERT"), ("key", "KEY")])
    }

    fn registry(url: &str) -> RegistryEndpoint {
        RegistryEndpoint {
            registry: url.to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            email: None,
        }
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_open_logs_in_with_daemon_auth() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::succeeding());

        let session = Session::open(
            executor.clone(),
            &CredentialProvisioner::new(temp_dir.path()),
            Some(&full_daemon()),
            Some(registry("reg.example.com")),
        )
        .unwrap();
        assert!(session.is_logged_in());

        let calls = executor.call_args();
        assert_eq!(calls.len(), 1);
        let login = &calls[0];
        let auth = session.builder().auth().unwrap();
        let mut expected = vec![
            "-H".to_string(),
            "tcp://build-host:2376".to_string(),
            "--tls".to_string(),
            format!("--tlscacert={}", auth.ca_path.display()),
            format!("--tlscert={}", auth.cert_path.display()),
            format!("--tlskey={}", auth.key_path.display()),
        ];
        expected.extend(
            ["login", "-u", "u", "-p", "p", "reg.example.com"]
                .iter()
                .map(|s| s.to_string()),
        );
        assert_eq!(login, &expected);
        assert_eq!(std::fs::read_to_string(&auth.ca_path).unwrap(), "CA");
    }

    #[test]
    fn test_close_logs_out_and_removes_credentials() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let mut session = Session::open(
            executor.clone(),
            &CredentialProvisioner::new(temp_dir.path()),
            Some(&full_daemon()),
            Some(registry("reg.example.com")),
        )
        .unwrap();
        assert_eq!(entries(temp_dir.path()), 1);

        session.close();
        session.close();

        let calls = executor.call_args();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].last().map(String::as_str), Some("logout"));
        assert_eq!(entries(temp_dir.path()), 0);
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_logout_failure_is_suppressed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::failing_on("logout"));
        let mut session = Session::open(
            executor.clone(),
            &CredentialProvisioner::new(temp_dir.path()),
            Some(&full_daemon()),
            Some(registry("reg.example.com")),
        )
        .unwrap();

        session.close();

        assert_eq!(entries(temp_dir.path()), 0);
    }

    #[test]
    fn test_failed_login_cleans_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::failing_on("login"));

        let err = Session::open(
            executor.clone(),
            &CredentialProvisioner::new(temp_dir.path()),
            Some(&full_daemon()),
            Some(registry("https://myreg.azurecr.io/")),
        )
        .unwrap_err();

        match err {
            TaskError::Authentication(message) => {
                assert!(message.contains("myreg.azurecr.io"));
                assert!(message.contains("login failed"));
            }
            other => panic!("expected authentication error, got {:?}", other),
        }
        // ログインしていないので logout も呼ばれない
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(entries(temp_dir.path()), 0);
    }

    #[test]
    fn test_missing_docker_is_not_an_auth_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::new(|_| {
            Err(TaskError::ToolNotFound {
                tool: "docker".to_string(),
            })
        }));

        let err = Session::open(
            executor.clone(),
            &CredentialProvisioner::new(temp_dir.path()),
            Some(&full_daemon()),
            Some(registry("reg.example.com")),
        )
        .unwrap_err();

        assert!(matches!(err, TaskError::ToolNotFound { tool } if tool == "docker"));
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(entries(temp_dir.path()), 0);
    }

    #[test]
    fn test_bad_credentials_leave_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::succeeding());

        let err = Session::open(
            executor.clone(),
            &CredentialProvisioner::new(temp_dir.path()),
            Some(&daemon(&[("username", "u"), ("password", "p")])),
            Some(registry("reg.example.com")),
        )
        .unwrap_err();

        assert!(matches!(err, TaskError::Credential(_)));
        assert!(executor.calls().is_empty());
        assert_eq!(entries(temp_dir.path()), 0);
    }

    #[test]
    fn test_drop_closes_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let session = Session::open(
            executor.clone(),
            &CredentialProvisioner::new(temp_dir.path()),
            Some(&full_daemon()),
            Some(registry("reg.example.com")),
        )
        .unwrap();

        drop(session);

        assert_eq!(executor.calls().len(), 2);
        assert_eq!(entries(temp_dir.path()), 0);
    }

    #[test]
    fn test_local_session_has_no_auth() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let mut session = Session::open(
            executor.clone(),
            &CredentialProvisioner::new(temp_dir.path()),
            None,
            None,
        )
        .unwrap();

        let push = session
            .create_command(&DockerCommand::Push {
                image: "app:v1".to_string(),
            })
            .unwrap();
        assert_eq!(push.args, vec!["push", "app:v1"]);

        session.close();
        assert!(executor.calls().is_empty());
        assert_eq!(entries(temp_dir.path()), 0);
    }

    #[test]
    fn test_qualify_image_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let provisioner = CredentialProvisioner::new(temp_dir.path());
        let open = |url: &str| {
            Session::open(
                Arc::new(ScriptedExecutor::succeeding()),
                &provisioner,
                None,
                Some(registry(url)),
            )
            .unwrap()
        };

        let session = open("https://myreg.azurecr.io/");
        assert_eq!(session.qualify_image_name("app"), "myreg.azurecr.io/app");
        assert_eq!(session.qualify_image_name("team/app:v1"), "myreg.azurecr.io/team/app:v1");
        assert_eq!(session.qualify_image_name("localhost:5000/app"), "localhost:5000/app");

        let hub = open("https://index.docker.io/v1/");
        assert_eq!(hub.qualify_image_name("app"), "app");
    }

    #[tokio::test]
    async fn test_exec_with_listener() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::new(|_| {
            Ok(CommandOutput::success("sha256:1\nsha256:2\n"))
        }));
        let session = Session::open(
            executor.clone(),
            &CredentialProvisioner::new(temp_dir.path()),
            None,
            None,
        )
        .unwrap();

        let mut ids = Vec::new();
        let mut collect = |line: &str| ids.push(line.to_string());
        session
            .exec_with(&DockerCommand::ListImageIds, &mut collect)
            .await
            .unwrap();

        assert_eq!(ids, vec!["sha256:1", "sha256:2"]);
    }
}

//! タスク実行 1 回分: セッションを開き、アクションを実行し、必ず閉じる

use crate::commands::{self, ActionContext, DockerAction};
use crate::compose::{self, ComposeAction};
use dockflow_config::TaskInputs;
use dockflow_session::{
    ComposeSession, CredentialProvisioner, DaemonEndpoint, Executor, GitTags, ProcessExecutor,
    RegistryEndpoint, Result, Session, SourceTagProvider, parse_file_args,
};
use std::path::PathBuf;
use std::sync::Arc;

pub struct TaskContext {
    pub inputs: TaskInputs,
    pub executor: Arc<dyn Executor>,
    pub provisioner: CredentialProvisioner,
    pub tags: Box<dyn SourceTagProvider>,
}

impl TaskContext {
    /// PATH 上の実ツールを使い、証明書はエージェントの一時ディレクトリに置く
    pub fn new(inputs: TaskInputs) -> Self {
        let cert_root = inputs
            .variable("Agent.TempDirectory")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        let repository = inputs
            .variable("Build.Repository.LocalPath")
            .map(PathBuf::from);

        Self {
            inputs,
            executor: Arc::new(ProcessExecutor::new()),
            provisioner: CredentialProvisioner::new(cert_root),
            tags: Box::new(GitTags::new(repository)),
        }
    }

    fn daemon_endpoint(&self) -> Result<Option<DaemonEndpoint>> {
        let Some(id) = self.inputs.input("dockerHostEndpoint", false)? else {
            return Ok(None);
        };
        let url = self.inputs.endpoint_url(&id, false)?.unwrap_or_default();
        let parameters = self
            .inputs
            .endpoint_authorization(&id, false)?
            .unwrap_or_default();
        Ok(Some(DaemonEndpoint::new(url, parameters)))
    }

    fn registry_endpoint(&self) -> Result<Option<RegistryEndpoint>> {
        let Some(id) = self.inputs.input("dockerRegistryEndpoint", false)? else {
            return Ok(None);
        };
        Ok(self
            .inputs
            .endpoint_authorization(&id, true)?
            .map(|parameters| RegistryEndpoint::from_parameters(&parameters)))
    }

    pub fn open_session(&self) -> Result<Session> {
        let daemon = self.daemon_endpoint()?;
        let registry = self.registry_endpoint()?;
        Session::open(
            Arc::clone(&self.executor),
            &self.provisioner,
            daemon.as_ref(),
            registry,
        )
    }

    fn action_context<'a>(&'a self, session: &'a Session) -> ActionContext<'a> {
        ActionContext {
            session,
            inputs: &self.inputs,
            tags: self.tags.as_ref(),
        }
    }

    pub async fn run_docker(&self, action: DockerAction) -> Result<String> {
        let mut session = self.open_session()?;
        let outcome = commands::run(action, &self.action_context(&session)).await;
        session.close();
        outcome
    }

    pub async fn run_compose(&self, action: ComposeAction) -> Result<String> {
        let compose_file = self.inputs.glob_first("dockerComposeFile")?;
        let additional = self
            .inputs
            .delimited_input("additionalDockerComposeFiles", '\n');
        let project_name = self.inputs.input("projectName", false)?;
        let file_args = parse_file_args(&self.inputs.delimited_input("dockerComposeFileArgs", '\n'))?;

        let session = self.open_session()?;
        let mut compose =
            ComposeSession::new(session, compose_file, &additional, project_name, file_args);
        let outcome = compose::run(action, &compose, &self.action_context(compose.session())).await;
        compose.close();
        outcome
    }
}

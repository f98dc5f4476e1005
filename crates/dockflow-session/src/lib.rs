//! Docker セッションのコア
//!
//! リモートデーモン用の TLS クライアント証明書を配置し、処理全体をレジストリ
//! ログインで囲み、`docker` / `docker-compose` の呼び出しを組み立てて
//! 1 つずつ実行します。
//!
//! ```no_run
//! use dockflow_session::{CredentialProvisioner, DockerCommand, ProcessExecutor, Session};
//! use std::sync::Arc;
//!
//! # async fn run() -> dockflow_session::Result<()> {
//! let provisioner = CredentialProvisioner::new(std::env::temp_dir());
//! let mut session = Session::open(Arc::new(ProcessExecutor::new()), &provisioner, None, None)?;
//! let result = session
//!     .exec(&DockerCommand::Push { image: "app:v1".into() })
//!     .await;
//! session.close();
//! result?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod compose;
pub mod credentials;
pub mod digest;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod image;
pub mod sequencer;
pub mod session;
pub mod source;

pub use command::{
    BuildOptions, CommandBuilder, DaemonAuth, DockerCommand, RunOptions, Tool, ToolCommand,
    tokenize_line,
};
pub use compose::{ComposeSession, parse_file_args, write_digest_compose_file};
pub use credentials::{CredentialBundle, CredentialProvisioner};
pub use digest::{DigestExtractor, DigestResult, DigestSource};
pub use endpoint::{DaemonEndpoint, RegistryEndpoint};
pub use error::{Result, TaskError};
pub use executor::{CommandOutput, Executor, ProcessExecutor};
pub use image::{TagPolicy, has_registry_component, image_name_without_tag, push_reference};
pub use sequencer::Sequencer;
pub use session::Session;
pub use source::{GitTags, SourceTagProvider, source_tags};

#[cfg(any(test, feature = "test-util"))]
pub use executor::ScriptedExecutor;

//! Docker Compose タスクのアクション

pub mod build;
pub mod command;
pub mod config;
pub mod lock;
pub mod push;
pub mod up;

use crate::commands::ActionContext;
use clap::ValueEnum;
use dockflow_session::{ComposeSession, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ComposeAction {
    #[value(alias = "Build services")]
    Build,
    #[value(alias = "Push services")]
    Push,
    #[value(alias = "Run services")]
    Up,
    #[value(alias = "Write service image digests")]
    Lock,
    #[value(alias = "Combine configuration")]
    Config,
    #[value(alias = "Run a Docker Compose command")]
    Command,
}

impl ComposeAction {
    pub fn title(&self) -> &'static str {
        match self {
            ComposeAction::Build => "Build services",
            ComposeAction::Push => "Push services",
            ComposeAction::Up => "Run services",
            ComposeAction::Lock => "Write service image digests",
            ComposeAction::Config => "Combine configuration",
            ComposeAction::Command => "Run a Docker Compose command",
        }
    }
}

pub async fn run(
    action: ComposeAction,
    compose: &ComposeSession,
    ctx: &ActionContext<'_>,
) -> Result<String> {
    match action {
        ComposeAction::Build => build::run(compose, ctx).await,
        ComposeAction::Push => push::run(compose, ctx).await,
        ComposeAction::Up => up::run(compose, ctx).await,
        ComposeAction::Lock => lock::run(compose, ctx).await,
        ComposeAction::Config => config::run(compose, ctx).await,
        ComposeAction::Command => command::run(compose, ctx).await,
    }
}

/// `docker-compose ... <args> [arguments]` を実行し、トリムした stdout を返す
async fn exec_compose(
    compose: &ComposeSession,
    ctx: &ActionContext<'_>,
    args: &[&str],
) -> Result<String> {
    let command = compose
        .compose_command(args)
        .extra_args(ctx.arguments()?.as_deref());
    let output = compose.session().executor().exec(&command).await?;
    Ok(output.result().to_string())
}

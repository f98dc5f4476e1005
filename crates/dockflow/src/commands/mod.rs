//! Docker タスクのアクション

pub mod build;
pub mod clean;
pub mod command;
pub mod publish;
pub mod push;
pub mod run;

use clap::ValueEnum;
use dockflow_config::TaskInputs;
use dockflow_session::{Result, Session, SourceTagProvider, TagPolicy, source_tags};

/// docker タスクの動作（`action` 入力で選ぶ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DockerAction {
    #[value(alias = "Build an image")]
    Build,
    #[value(alias = "Push an image", alias = "Push images")]
    Push,
    #[value(alias = "Run an image")]
    Run,
    #[value(alias = "Run a Docker command")]
    Command,
    #[value(alias = "Clean all images")]
    Clean,
    #[value(alias = "Publish an image")]
    Publish,
}

impl DockerAction {
    pub fn title(&self) -> &'static str {
        match self {
            DockerAction::Build => "Build an image",
            DockerAction::Push => "Push an image",
            DockerAction::Run => "Run an image",
            DockerAction::Command => "Run a Docker command",
            DockerAction::Clean => "Clean all images",
            DockerAction::Publish => "Publish an image",
        }
    }
}

/// アクションが参照する共通のコンテキスト
pub struct ActionContext<'a> {
    pub session: &'a Session,
    pub inputs: &'a TaskInputs,
    pub tags: &'a dyn SourceTagProvider,
}

impl ActionContext<'_> {
    /// `imageName`（指定があればレジストリホストで修飾）
    pub fn image_name(&self) -> Result<String> {
        let image = self.inputs.required_input("imageName")?;
        if self.inputs.bool_input("qualifyImageName") {
            Ok(self.session.qualify_image_name(&image))
        } else {
            Ok(image)
        }
    }

    pub fn tag_policy(&self) -> Result<TagPolicy> {
        let source_tags = if self.inputs.bool_input("includeSourceTags")
            || self.inputs.bool_input("includeGitTags")
        {
            source_tags(
                self.inputs.variable("Build.Repository.Provider").as_deref(),
                self.inputs.variable("Build.SourceVersion").as_deref(),
                self.tags,
            )?
        } else {
            Vec::new()
        };

        Ok(TagPolicy {
            additional_tags: self.inputs.delimited_input("additionalImageTags", '\n'),
            source_tags,
            include_latest: self.inputs.bool_input("includeLatestTag"),
        })
    }

    /// 生成したコマンドの末尾に付ける自由形式の `arguments`
    pub fn arguments(&self) -> Result<Option<String>> {
        Ok(self.inputs.input("arguments", false)?)
    }
}

pub async fn run(action: DockerAction, ctx: &ActionContext<'_>) -> Result<String> {
    match action {
        DockerAction::Build => build::run(ctx).await,
        DockerAction::Push => push::run(ctx).await,
        DockerAction::Run => run::run(ctx).await,
        DockerAction::Command => command::run(ctx).await,
        DockerAction::Clean => clean::run(ctx).await,
        DockerAction::Publish => publish::run(ctx).await,
    }
}

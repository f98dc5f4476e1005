use super::exec_compose;
use crate::commands::ActionContext;
use dockflow_session::{ComposeSession, DockerCommand, Result, Sequencer};

/// `docker-compose build` の後、ビルドした各イメージにタグを付ける
pub async fn run(compose: &ComposeSession, ctx: &ActionContext<'_>) -> Result<String> {
    let result = exec_compose(compose, ctx, &["build"]).await?;

    let policy = ctx.tag_policy()?;
    let images = compose.built_images().await?;

    let mut tagging = Vec::new();
    for (_, image) in &images {
        for target in policy.build_tags(image) {
            tagging.push((image.as_str(), target));
        }
    }

    let session = compose.session();
    let mut sequencer = Sequencer::new();
    for (source, target) in &tagging {
        sequencer.push(format!("tag {} {}", source, target), move || async move {
            session
                .exec(&DockerCommand::Tag {
                    source: source.to_string(),
                    target: target.clone(),
                })
                .await
        });
    }
    sequencer.run().await?;

    Ok(result)
}

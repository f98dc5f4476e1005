use super::ActionContext;
use super::push::{digest_file, last_result, push_all};
use dockflow_session::{DockerCommand, Result, Sequencer};

/// プッシュ後、指定があればプッシュした参照をデーモンから削除
pub async fn run(ctx: &ActionContext<'_>) -> Result<String> {
    let image_name = ctx.image_name()?;
    let references = ctx.tag_policy()?.push_references(&image_name);
    let digest_file = digest_file(ctx)?;

    let mut outputs = push_all(ctx.session, &references, digest_file.as_deref()).await?;

    if ctx.inputs.bool_input("removeImageAfterPush") {
        let session = ctx.session;
        let mut sequencer = Sequencer::new();
        for reference in &references {
            sequencer.push(format!("rmi {}", reference), move || async move {
                session
                    .exec(&DockerCommand::RemoveImage {
                        image: reference.clone(),
                    })
                    .await
            });
        }
        outputs.extend(sequencer.run().await?);
    }

    Ok(last_result(&outputs))
}

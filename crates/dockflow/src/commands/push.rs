use super::ActionContext;
use dockflow_session::{
    CommandOutput, DigestExtractor, DockerCommand, Result, Sequencer, Session, TaskError,
};
use std::path::Path;

pub async fn run(ctx: &ActionContext<'_>) -> Result<String> {
    let image_name = ctx.image_name()?;
    let references = ctx.tag_policy()?.push_references(&image_name);
    let digest_file = digest_file(ctx)?;

    let outputs = push_all(ctx.session, &references, digest_file.as_deref()).await?;
    Ok(last_result(&outputs))
}

pub(super) fn digest_file(ctx: &ActionContext<'_>) -> Result<Option<std::path::PathBuf>> {
    if ctx.inputs.file_path_supplied("imageDigestFile") {
        Ok(ctx.inputs.path_input("imageDigestFile", false)?)
    } else {
        Ok(None)
    }
}

/// `references` を 1 つずつ順にプッシュ
///
/// `digest_file` があれば、最初の参照のダイジェストを `name@digest`
/// として書き出す。
pub(super) async fn push_all(
    session: &Session,
    references: &[String],
    digest_file: Option<&Path>,
) -> Result<Vec<CommandOutput>> {
    let mut sequencer = Sequencer::new();
    for (index, reference) in references.iter().enumerate() {
        let digest_file = digest_file.filter(|_| index == 0);
        sequencer.push(format!("push {}", reference), move || async move {
            let output = session
                .exec(&DockerCommand::Push {
                    image: reference.clone(),
                })
                .await?;
            if let Some(path) = digest_file
                && let Some(digest) = DigestExtractor::push().extract(reference, &output.stdout)
            {
                std::fs::write(path, digest.pinned_reference()).map_err(|source| {
                    TaskError::Filesystem {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
            }
            Ok(output)
        });
    }
    sequencer.run().await
}

pub(super) fn last_result(outputs: &[CommandOutput]) -> String {
    outputs
        .last()
        .map(|o| o.result().to_string())
        .unwrap_or_default()
}

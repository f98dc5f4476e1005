use crate::commands::ActionContext;
use dockflow_session::{
    ComposeSession, DigestExtractor, DockerCommand, Result, Sequencer, TaskError,
    write_digest_compose_file,
};

/// 全サービスのイメージを pull し、レジストリが返すダイジェストに固定
///
/// pull の出力にダイジェストが無いサービスはファイルに含めない。
pub async fn run(compose: &ComposeSession, ctx: &ActionContext<'_>) -> Result<String> {
    let path = ctx
        .inputs
        .path_input("imageDigestComposeFile", true)?
        .ok_or_else(|| TaskError::Configuration("imageDigestComposeFile is required".into()))?;
    let images = compose.images().await?;

    let session = compose.session();
    let mut sequencer = Sequencer::new();
    for (service, image) in &images {
        sequencer.push(format!("pull {}", image), move || async move {
            let output = session
                .exec(&DockerCommand::Pull {
                    image: image.clone(),
                })
                .await?;
            Ok(DigestExtractor::pull()
                .extract(image, &output.stdout)
                .map(|digest| (service.clone(), digest.pinned_reference())))
        });
    }
    let pinned: Vec<(String, String)> = sequencer.run().await?.into_iter().flatten().collect();

    write_digest_compose_file(&path, &pinned)?;
    Ok(String::new())
}

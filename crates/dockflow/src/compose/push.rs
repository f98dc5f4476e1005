use crate::commands::ActionContext;
use dockflow_session::{
    ComposeSession, DigestExtractor, DockerCommand, Result, Sequencer, write_digest_compose_file,
};

/// ビルドした全サービスのイメージをタグごとにプッシュ
///
/// 各サービスは主参照を最初にプッシュし、そのダイジェストを
/// `imageDigestComposeFile`（任意）に書き出す。
pub async fn run(compose: &ComposeSession, ctx: &ActionContext<'_>) -> Result<String> {
    let policy = ctx.tag_policy()?;
    let images = compose.built_images().await?;
    let digest_file = if ctx.inputs.file_path_supplied("imageDigestComposeFile") {
        ctx.inputs.path_input("imageDigestComposeFile", false)?
    } else {
        None
    };
    let capture = digest_file.is_some();

    let mut pushes = Vec::new();
    for (service, image) in &images {
        for (index, reference) in policy.push_references(image).into_iter().enumerate() {
            pushes.push((service.as_str(), reference, capture && index == 0));
        }
    }

    let session = compose.session();
    let mut sequencer = Sequencer::new();
    for (service, reference, capture) in &pushes {
        sequencer.push(format!("push {}", reference), move || async move {
            let output = session
                .exec(&DockerCommand::Push {
                    image: reference.clone(),
                })
                .await?;
            let pinned = if *capture {
                DigestExtractor::push()
                    .extract(reference, &output.stdout)
                    .map(|digest| (service.to_string(), digest.pinned_reference()))
            } else {
                None
            };
            Ok((output, pinned))
        });
    }
    let results = sequencer.run().await?;

    if let Some(path) = digest_file {
        let pinned: Vec<(String, String)> =
            results.iter().filter_map(|(_, pin)| pin.clone()).collect();
        write_digest_compose_file(&path, &pinned)?;
    }

    Ok(results
        .last()
        .map(|(output, _)| output.result().to_string())
        .unwrap_or_default())
}

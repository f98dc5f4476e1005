use super::ActionContext;
use super::push::last_result;
use dockflow_session::{DockerCommand, Result, Sequencer};

/// デーモン上の全イメージを削除
pub async fn run(ctx: &ActionContext<'_>) -> Result<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut collect = |line: &str| {
        let id = line.trim();
        if !id.is_empty() && !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    };
    ctx.session
        .exec_with(&DockerCommand::ListImageIds, &mut collect)
        .await?;

    if ids.is_empty() {
        tracing::info!("No images to remove");
        return Ok(String::new());
    }
    tracing::info!("Removing {} images", ids.len());

    let session = ctx.session;
    let mut sequencer = Sequencer::new();
    for id in &ids {
        sequencer.push(format!("rmi {}", id), move || async move {
            session
                .exec(&DockerCommand::RemoveImage { image: id.clone() })
                .await
        });
    }
    let outputs = sequencer.run().await?;
    Ok(last_result(&outputs))
}

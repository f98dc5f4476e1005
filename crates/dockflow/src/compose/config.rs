use crate::commands::ActionContext;
use dockflow_session::{ComposeSession, Result, TaskError};

/// 全 compose ファイルをマージした設定を 1 ファイルに書き出す
pub async fn run(compose: &ComposeSession, ctx: &ActionContext<'_>) -> Result<String> {
    let output_file = ctx
        .inputs
        .path_input("outputDockerComposeFile", true)?
        .ok_or_else(|| TaskError::Configuration("outputDockerComposeFile is required".into()))?;

    let mut config = compose.combined_config().await?;
    if let Some(base) = ctx.inputs.input("baseResolveDirectory", false)? {
        config = config.replace(&base, ".");
    }

    std::fs::write(&output_file, &config).map_err(|source| TaskError::Filesystem {
        path: output_file.clone(),
        source,
    })?;
    tracing::info!("Wrote combined configuration to {}", output_file.display());

    Ok(config.trim().to_string())
}

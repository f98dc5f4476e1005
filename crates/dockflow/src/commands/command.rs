use super::ActionContext;
use dockflow_session::{DockerCommand, Result};

pub async fn run(ctx: &ActionContext<'_>) -> Result<String> {
    let line = ctx.inputs.required_input("customCommand")?;
    let output = ctx.session.exec(&DockerCommand::Custom(line)).await?;
    Ok(output.result().to_string())
}

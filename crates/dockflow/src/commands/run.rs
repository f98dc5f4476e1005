use super::ActionContext;
use dockflow_session::{DockerCommand, Result, RunOptions};

pub async fn run(ctx: &ActionContext<'_>) -> Result<String> {
    let inputs = ctx.inputs;
    let options = RunOptions {
        image_name: ctx.image_name()?,
        detached: inputs.bool_input("detached"),
        entrypoint: inputs.input("entrypoint", false)?,
        env: inputs.delimited_input("envVars", '\n'),
        container_name: inputs.input("containerName", false)?,
        ports: inputs.delimited_input("ports", '\n'),
        volumes: inputs.delimited_input("volumes", '\n'),
        work_dir: inputs.input("workDir", false)?,
        command: inputs.input("containerCommand", false)?,
    };

    let command = ctx
        .session
        .create_command(&DockerCommand::Run(options))?
        .extra_args(ctx.arguments()?.as_deref());
    let output = ctx.session.executor().exec(&command).await?;
    Ok(output.result().to_string())
}

use super::exec_compose;
use crate::commands::ActionContext;
use dockflow_session::{ComposeSession, Result};

pub async fn run(compose: &ComposeSession, ctx: &ActionContext<'_>) -> Result<String> {
    let mut args = vec!["up"];
    if ctx.inputs.bool_input_or("detached", true) {
        args.push("-d");
    }
    if ctx.inputs.bool_input("buildImages") {
        args.push("--build");
    }
    exec_compose(compose, ctx, &args).await
}

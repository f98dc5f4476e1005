use super::exec_compose;
use crate::commands::ActionContext;
use dockflow_session::{ComposeSession, Result, tokenize_line};

pub async fn run(compose: &ComposeSession, ctx: &ActionContext<'_>) -> Result<String> {
    let line = ctx.inputs.required_input("dockerComposeCommand")?;
    let tokens = tokenize_line(&line);
    let args: Vec<&str> = tokens.iter().map(String::as_str).collect();
    exec_compose(compose, ctx, &args).await
}

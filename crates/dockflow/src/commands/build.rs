use super::ActionContext;
use dockflow_session::{BuildOptions, DockerCommand, Result};
use std::path::Path;

pub async fn run(ctx: &ActionContext<'_>) -> Result<String> {
    let inputs = ctx.inputs;
    let dockerfile = inputs.glob_first("dockerFile")?;
    let image_name = ctx.image_name()?;
    let tags = ctx.tag_policy()?.build_tags(&image_name);

    let context = if inputs.file_path_supplied("buildContext") {
        inputs.path_input("buildContext", true)?.unwrap_or_default()
    } else {
        dockerfile
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    };

    let command = ctx
        .session
        .create_command(&DockerCommand::Build(BuildOptions {
            dockerfile,
            image_name,
            tags,
            build_args: inputs.delimited_input("buildArguments", '\n'),
            context,
        }))?
        .extra_args(ctx.arguments()?.as_deref());

    let output = ctx.session.executor().exec(&command).await?;
    Ok(output.result().to_string())
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use dockflow_session::{CommandOutput, ScriptedExecutor, TaskError};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_build_with_tags_and_arguments() {
        let temp_dir = tempfile::tempdir().unwrap();
        let app_dir = temp_dir.path().join("app");
        std::fs::create_dir(&app_dir).unwrap();
        std::fs::write(app_dir.join("Dockerfile"), "FROM scratch\n").unwrap();
        let pattern = format!("{}/*/Dockerfile", temp_dir.path().display());

        let executor = Arc::new(ScriptedExecutor::new(|_| {
            Ok(CommandOutput::success("Successfully built 0123abcd\n"))
        }));
        let session = local_session(&executor, temp_dir.path());
        let inputs = inputs(&[
            ("INPUT_DOCKERFILE", pattern.as_str()),
            ("INPUT_IMAGENAME", "app:build-7"),
            ("INPUT_ADDITIONALIMAGETAGS", "v1"),
            ("INPUT_INCLUDELATESTTAG", "true"),
            ("INPUT_BUILDARGUMENTS", "A=1\nB=2"),
            ("INPUT_ARGUMENTS", "--pull"),
        ]);
        let tags = FixedTags(Vec::new());
        let ctx = ActionContext {
            session: &session,
            inputs: &inputs,
            tags: &tags,
        };

        let result = run(&ctx).await.unwrap();

        assert_eq!(result, "Successfully built 0123abcd");
        let dockerfile = app_dir.join("Dockerfile").display().to_string();
        let context = app_dir.display().to_string();
        assert_eq!(
            executor.call_args(),
            vec![vec![
                "build",
                "-f",
                dockerfile.as_str(),
                "--build-arg",
                "A=1",
                "--build-arg",
                "B=2",
                "-t",
                "app:build-7",
                "-t",
                "app:v1",
                "-t",
                "app",
                context.as_str(),
                "--pull",
            ]]
        );
    }

    #[tokio::test]
    async fn test_build_context_input() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        let dockerfile = temp_dir.path().join("Dockerfile").display().to_string();

        let executor = Arc::new(ScriptedExecutor::succeeding());
        let session = local_session(&executor, temp_dir.path());
        let inputs = inputs(&[
            ("INPUT_DOCKERFILE", dockerfile.as_str()),
            ("INPUT_IMAGENAME", "app"),
            ("INPUT_BUILDCONTEXT", "/src/ctx"),
            ("BUILD_SOURCESDIRECTORY", "/src"),
        ]);
        let tags = FixedTags(Vec::new());
        let ctx = ActionContext {
            session: &session,
            inputs: &inputs,
            tags: &tags,
        };

        run(&ctx).await.unwrap();

        let args = &executor.call_args()[0];
        assert_eq!(args.last().map(String::as_str), Some("/src/ctx"));
        assert_eq!(args.iter().filter(|a| *a == "-t").count(), 1);
    }

    #[tokio::test]
    async fn test_missing_dockerfile_runs_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/nope/Dockerfile", temp_dir.path().display());
        let executor = Arc::new(ScriptedExecutor::succeeding());
        let session = local_session(&executor, temp_dir.path());
        let inputs = inputs(&[
            ("INPUT_DOCKERFILE", pattern.as_str()),
            ("INPUT_IMAGENAME", "app"),
        ]);
        let tags = FixedTags(Vec::new());
        let ctx = ActionContext {
            session: &session,
            inputs: &inputs,
            tags: &tags,
        };

        let err = run(&ctx).await.unwrap_err();

        assert!(matches!(err, TaskError::Configuration(m) if m.contains("dockerFile")));
        assert!(executor.calls().is_empty());
    }
}

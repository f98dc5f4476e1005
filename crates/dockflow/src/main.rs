mod commands;
mod compose;
mod report;
mod task;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use commands::DockerAction;
use compose::ComposeAction;
use dockflow_config::TaskInputs;
use std::path::PathBuf;
use task::TaskContext;

#[derive(Parser)]
#[command(name = "dockflow")]
#[command(about = "CI パイプライン向けの Docker / Docker Compose ビルドステップ", long_about = None)]
struct Cli {
    /// 入力・変数・エンドポイントを記述した YAML ファイル（環境変数より優先）
    #[arg(long, global = true, env = "DOCKFLOW_INPUTS")]
    inputs: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// イメージのビルド・プッシュ・実行・削除
    Docker {
        /// 実行するアクション（省略時は `action` 入力）
        #[arg(short, long, value_enum)]
        action: Option<DockerAction>,
    },
    /// docker-compose サービスのビルド・プッシュ・起動
    Compose {
        /// 実行するアクション（省略時は `action` 入力）
        #[arg(short, long, value_enum)]
        action: Option<ComposeAction>,
    },
    /// バージョン情報を表示
    Version,
}

fn load_inputs(path: Option<&PathBuf>) -> anyhow::Result<TaskInputs> {
    let inputs = TaskInputs::from_env();
    let inputs = match path {
        Some(path) => inputs.with_inputs_file(path)?,
        None => inputs,
    };

    if let Some(cwd) = inputs.path_input("cwd", false)? {
        std::env::set_current_dir(&cwd)
            .with_context(|| format!("Failed to change directory to {}", cwd.display()))?;
        tracing::debug!("Working directory: {}", cwd.display());
    }
    Ok(inputs)
}

/// コマンドラインのアクション、無ければ `action` 入力
fn resolve_action<A: ValueEnum>(flag: Option<A>, inputs: &TaskInputs) -> anyhow::Result<A> {
    if let Some(action) = flag {
        return Ok(action);
    }
    let name = inputs.required_input("action")?;
    A::from_str(&name, true).map_err(|_| anyhow::anyhow!("Unknown action '{}'", name))
}

async fn execute(cli: &Cli) -> anyhow::Result<Option<String>> {
    let inputs = load_inputs(cli.inputs.as_ref())?;

    let result = match &cli.command {
        Commands::Docker { action } => {
            let action = resolve_action(*action, &inputs)?;
            println!("{}", format!("▶ {}", action.title()).cyan().bold());
            TaskContext::new(inputs.clone()).run_docker(action).await?
        }
        Commands::Compose { action } => {
            let action = resolve_action(*action, &inputs)?;
            println!("{}", format!("▶ {}", action.title()).cyan().bold());
            TaskContext::new(inputs.clone()).run_compose(action).await?
        }
        Commands::Version => unreachable!("Version is handled before inputs are loaded"),
    };

    tracing::info!("Result: {}", result);
    match inputs.input("outputVariableName", false)? {
        Some(name) => {
            report::set_variable(&name, &result);
            Ok(Some(name))
        }
        None => {
            tracing::debug!("No output variable requested");
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout はツール出力とホスト向けロギングコマンド用
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("dockflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    match execute(&cli).await {
        Ok(variable) => {
            if let Some(name) = variable {
                println!("{} {}", "✓ Output variable set:".green(), name);
            }
            report::complete_succeeded();
            Ok(())
        }
        Err(err) => {
            let message = report::failure_message(&err);
            eprintln!("{} {:#}", "✗".red().bold(), err);
            report::complete_failed(&message);
            std::process::exit(1);
        }
    }
}

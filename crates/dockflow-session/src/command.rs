//! docker CLI の引数ベクタ
//!
//! すべての呼び出しは [`DockerCommand`] で表し、セッションのデーモン認証を持つ
//! [`CommandBuilder`] が [`ToolCommand`] に変換します。呼び出し側が TLS フラグを
//! 組み立てることはありません。

use crate::error::{Result, TaskError};
use std::path::{Path, PathBuf};

/// 実行するツール
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Docker,
    Compose,
}

impl Tool {
    pub fn program(&self) -> &'static str {
        match self {
            Tool::Docker => "docker",
            Tool::Compose => "docker-compose",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program())
    }
}

/// Executor にそのまま渡せる呼び出し
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub tool: Tool,
    pub args: Vec<String>,
    /// このサブプロセスにだけ渡す環境変数
    pub env: Vec<(String, String)>,
    /// 出力をタスクログに表示しない
    pub silent: bool,
    secrets: Vec<String>,
}

impl ToolCommand {
    pub fn new(tool: Tool, args: Vec<String>) -> Self {
        Self {
            tool,
            args,
            env: Vec::new(),
            silent: false,
            secrets: Vec::new(),
        }
    }

    /// 自由形式の引数行を末尾に追加（分割のみで検証しない）
    pub fn extra_args(mut self, line: Option<&str>) -> Self {
        if let Some(line) = line {
            self.args.extend(tokenize_line(line));
        }
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn envs(mut self, env: &[(String, String)]) -> Self {
        self.env.extend_from_slice(env);
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// ログ用のコマンドライン（秘密情報はマスク）
    pub fn display_line(&self) -> String {
        let mut line = self.tool.program().to_string();
        for arg in &self.args {
            line.push(' ');
            if self.secrets.iter().any(|s| !s.is_empty() && s == arg) {
                line.push_str("***");
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    /// エラーメッセージ用の短いラベル（例: `docker push`）
    pub fn label(&self) -> String {
        let verb = self
            .args
            .iter()
            .find(|a| !a.starts_with('-') && !self.is_flag_value(a))
            .map(String::as_str)
            .unwrap_or_default();
        format!("{} {}", self.tool.program(), verb).trim_end().to_string()
    }

    fn is_flag_value(&self, arg: &str) -> bool {
        self.args
            .windows(2)
            .any(|w| w[1] == arg && (w[0] == "-H" || w[0] == "-f" || w[0] == "-p"))
    }
}

/// リモートデーモンの TLS 設定（ディスク上のパス）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonAuth {
    pub url: String,
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl DaemonAuth {
    /// `-H <url> --tls --tlscacert=<ca> --tlscert=<cert> --tlskey=<key>`
    ///
    /// 位置で解釈するクライアントがあるため順序は固定。
    pub fn flags(&self) -> Vec<String> {
        vec![
            "-H".to_string(),
            self.url.clone(),
            "--tls".to_string(),
            format!("--tlscacert={}", self.ca_path.display()),
            format!("--tlscert={}", self.cert_path.display()),
            format!("--tlskey={}", self.key_path.display()),
        ]
    }
}

/// `docker build` のオプション
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub dockerfile: PathBuf,
    pub image_name: String,
    /// イメージ名の後に付ける追加の `-t`
    pub tags: Vec<String>,
    /// `--build-arg` に渡す `KEY=VALUE`
    pub build_args: Vec<String>,
    pub context: PathBuf,
}

/// `docker run` のオプション
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub image_name: String,
    pub detached: bool,
    pub entrypoint: Option<String>,
    pub env: Vec<String>,
    pub container_name: Option<String>,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub work_dir: Option<String>,
    pub command: Option<String>,
}

/// docker の論理操作
#[derive(Debug, Clone)]
pub enum DockerCommand {
    Build(BuildOptions),
    Run(RunOptions),
    Push { image: String },
    Pull { image: String },
    Tag { source: String, target: String },
    Login {
        username: String,
        password: String,
        registry: Option<String>,
    },
    Logout,
    RemoveImage { image: String },
    RemoveContainer { container: String },
    /// `images -aq`: 全イメージ ID を 1 行ずつ
    ListImageIds,
    /// 呼び出し側が指定したコマンドライン
    Custom(String),
}

impl DockerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DockerCommand::Build(_) => "build",
            DockerCommand::Run(_) => "run",
            DockerCommand::Push { .. } => "push",
            DockerCommand::Pull { .. } => "pull",
            DockerCommand::Tag { .. } => "tag",
            DockerCommand::Login { .. } => "login",
            DockerCommand::Logout => "logout",
            DockerCommand::RemoveImage { .. } => "rmi",
            DockerCommand::RemoveContainer { .. } => "rm",
            DockerCommand::ListImageIds => "images",
            DockerCommand::Custom(_) => "custom",
        }
    }
}

/// 1 つのデーモン向けに docker の呼び出しを組み立てる
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    auth: Option<DaemonAuth>,
}

impl CommandBuilder {
    pub fn new(auth: Option<DaemonAuth>) -> Self {
        Self { auth }
    }

    pub fn auth(&self) -> Option<&DaemonAuth> {
        self.auth.as_ref()
    }

    /// 全コマンドの先頭に付くデーモンフラグ（ローカルデーモンでは空）
    pub fn auth_flags(&self) -> Vec<String> {
        self.auth.as_ref().map(DaemonAuth::flags).unwrap_or_default()
    }

    pub fn build(&self, command: &DockerCommand) -> Result<ToolCommand> {
        let mut args = self.auth_flags();
        let mut secrets = Vec::new();

        match command {
            DockerCommand::Build(options) => {
                require("imageName", &options.image_name)?;
                require_path("dockerFile", &options.dockerfile)?;
                args.push("build".to_string());
                push_pair(&mut args, "-f", options.dockerfile.display().to_string());
                for build_arg in &options.build_args {
                    push_pair(&mut args, "--build-arg", build_arg);
                }
                push_pair(&mut args, "-t", &options.image_name);
                for tag in &options.tags {
                    push_pair(&mut args, "-t", tag);
                }
                let context = if options.context.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    options.context.as_path()
                };
                args.push(context.display().to_string());
            }
            DockerCommand::Run(options) => {
                require("imageName", &options.image_name)?;
                args.push("run".to_string());
                if options.detached {
                    args.push("-d".to_string());
                }
                if let Some(entrypoint) = &options.entrypoint {
                    push_pair(&mut args, "--entrypoint", entrypoint);
                }
                for env in &options.env {
                    push_pair(&mut args, "-e", env);
                }
                if let Some(name) = &options.container_name {
                    push_pair(&mut args, "--name", name);
                }
                for port in &options.ports {
                    push_pair(&mut args, "-p", port);
                }
                if !options.detached {
                    args.push("--rm".to_string());
                }
                args.push("-t".to_string());
                for volume in &options.volumes {
                    push_pair(&mut args, "-v", volume);
                }
                if let Some(dir) = &options.work_dir {
                    push_pair(&mut args, "-w", dir);
                }
                args.push(options.image_name.clone());
                if let Some(line) = &options.command {
                    args.extend(tokenize_line(line));
                }
            }
            DockerCommand::Push { image } => {
                require("imageName", image)?;
                args.extend(["push".to_string(), image.clone()]);
            }
            DockerCommand::Pull { image } => {
                require("imageName", image)?;
                args.extend(["pull".to_string(), image.clone()]);
            }
            DockerCommand::Tag { source, target } => {
                require("source image", source)?;
                require("target image", target)?;
                args.extend(["tag".to_string(), source.clone(), target.clone()]);
            }
            DockerCommand::Login {
                username,
                password,
                registry,
            } => {
                args.push("login".to_string());
                push_pair(&mut args, "-u", username);
                push_pair(&mut args, "-p", password);
                if let Some(registry) = registry.as_ref().filter(|r| !r.is_empty()) {
                    args.push(registry.clone());
                }
                secrets.push(password.clone());
            }
            DockerCommand::Logout => args.push("logout".to_string()),
            DockerCommand::RemoveImage { image } => {
                require("image", image)?;
                args.extend(["rmi".to_string(), "--force".to_string(), image.clone()]);
            }
            DockerCommand::RemoveContainer { container } => {
                require("containerName", container)?;
                args.extend(["rm".to_string(), "--force".to_string(), container.clone()]);
            }
            DockerCommand::ListImageIds => {
                args.extend(["images".to_string(), "-aq".to_string()]);
            }
            DockerCommand::Custom(line) => {
                let tokens = tokenize_line(line);
                if tokens.is_empty() {
                    return Err(TaskError::Configuration(
                        "customCommand is empty".to_string(),
                    ));
                }
                args.extend(tokens);
            }
        }

        let mut tool_command = ToolCommand::new(Tool::Docker, args);
        tool_command.secrets = secrets;
        Ok(tool_command)
    }
}

fn push_pair(args: &mut Vec<String>, flag: &str, value: impl Into<String>) {
    args.push(flag.to_string());
    args.push(value.into());
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TaskError::Configuration(format!("{} is required", field)));
    }
    Ok(())
}

fn require_path(field: &str, value: &Path) -> Result<()> {
    if value.as_os_str().is_empty() {
        return Err(TaskError::Configuration(format!("{} is required", field)));
    }
    Ok(())
}

/// コマンドラインをシェルと同じ規則で分割
///
/// クォートが閉じていない場合でも引数は捨てず、空白で分割する。
pub fn tokenize_line(line: &str) -> Vec<String> {
    shell_words::split(line).unwrap_or_else(|e| {
        tracing::debug!("Splitting on whitespace ({}): {}", e, line);
        line.split_whitespace().map(str::to_string).collect()
    })
}

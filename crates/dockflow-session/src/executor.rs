//! サブプロセス実行
//!
//! [`Executor`] は [`ToolCommand`] を最後まで実行し、取り込んだ出力を返します。
//! 標準出力の各行は実行中にリスナーへ渡され、結果はプロセス終了後に確定します。

use crate::command::{Tool, ToolCommand};
use crate::error::{Result, TaskError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// 失敗メッセージに残す stderr の行数
const STDERR_TAIL_LINES: usize = 5;

/// 終了したコマンドの出力
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// タスク結果として公開する、前後の空白を除いた stdout
    pub fn result(&self) -> &str {
        self.stdout.trim()
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// 実行して終了を待つ。stdout の各行は届いた順に `listener` へ渡す
    async fn exec_with(
        &self,
        command: &ToolCommand,
        listener: Option<&mut (dyn for<'l> FnMut(&'l str) + Send)>,
    ) -> Result<CommandOutput>;

    async fn exec(&self, command: &ToolCommand) -> Result<CommandOutput> {
        self.exec_with(command, None).await
    }

    /// 呼び出し元のスレッドで実行
    fn exec_blocking(&self, command: &ToolCommand) -> Result<CommandOutput>;
}

/// PATH 上の `docker` / `docker-compose` を実際に起動する
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    working_dir: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(working_dir.into()),
        }
    }

    /// PATH からツールを探す
    pub fn locate(tool: Tool) -> Result<PathBuf> {
        which::which(tool.program()).map_err(|_| TaskError::ToolNotFound {
            tool: tool.program().to_string(),
        })
    }

    fn announce(command: &ToolCommand) {
        tracing::debug!("Running: {}", command.display_line());
        if !command.silent {
            println!("[command]{}", command.display_line());
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn exec_with(
        &self,
        command: &ToolCommand,
        listener: Option<&mut (dyn for<'l> FnMut(&'l str) + Send)>,
    ) -> Result<CommandOutput> {
        let program = Self::locate(command.tool)?;
        Self::announce(command);

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;

        let silent = command.silent;
        let stderr_reader = tokio::spawn(async move {
            let mut raw = Vec::new();
            stderr.read_to_end(&mut raw).await.map(|_| {
                let buffer = String::from_utf8_lossy(&raw).into_owned();
                if !silent && !buffer.is_empty() {
                    eprint!("{}", buffer);
                }
                buffer
            })
        });

        // 読み取りに失敗しても子プロセスは必ず回収する
        let streamed = stream_lines(stdout, silent, listener).await;
        let status = child.wait().await?;
        let stderr_buffer = stderr_reader
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;
        let stdout_buffer = streamed?;

        finish(command, status, stdout_buffer, stderr_buffer)
    }

    fn exec_blocking(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let program = Self::locate(command.tool)?;
        Self::announce(command);

        let mut cmd = std::process::Command::new(program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !command.silent {
            print!("{}", stdout);
            eprint!("{}", stderr);
        }

        finish(command, output.status, stdout, stderr)
    }
}

/// stdout を行単位で読み、不正な UTF-8 は置換文字に変えて渡す
async fn stream_lines<R: AsyncRead + Unpin>(
    reader: R,
    silent: bool,
    mut listener: Option<&mut (dyn for<'l> FnMut(&'l str) + Send)>,
) -> std::io::Result<String> {
    let mut reader = BufReader::new(reader);
    let mut buffer = String::new();
    let mut raw = Vec::new();

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&raw);
        let line = text.trim_end_matches('\n').trim_end_matches('\r');
        if !silent {
            println!("{}", line);
        }
        if let Some(listener) = listener.as_deref_mut() {
            listener(line);
        }
        buffer.push_str(line);
        buffer.push('\n');
    }

    Ok(buffer)
}

fn finish(
    command: &ToolCommand,
    status: ExitStatus,
    stdout: String,
    stderr: String,
) -> Result<CommandOutput> {
    let exit_code = status.code().unwrap_or(-1);
    if !status.success() {
        return Err(TaskError::Command {
            tool: command.label(),
            exit_code,
            stderr_tail: stderr_tail(&stderr),
        });
    }

    Ok(CommandOutput {
        exit_code,
        stdout,
        stderr,
    })
}

/// 空行を除いた stderr の末尾数行
pub fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedExecutor;

#[cfg(any(test, feature = "test-util"))]
mod scripted {
    use super::*;
    use std::sync::Mutex;

    type Handler = Box<dyn Fn(&ToolCommand) -> Result<CommandOutput> + Send + Sync>;

    /// 実行したコマンドを記録し、ハンドラの返す結果で応答する Executor
    pub struct ScriptedExecutor {
        calls: Mutex<Vec<ToolCommand>>,
        handler: Handler,
    }

    impl ScriptedExecutor {
        pub fn new(
            handler: impl Fn(&ToolCommand) -> Result<CommandOutput> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                handler: Box::new(handler),
            }
        }

        /// すべてのコマンドが空出力で成功する
        pub fn succeeding() -> Self {
            Self::new(|_| Ok(CommandOutput::success("")))
        }

        /// 引数に `needle` を含むコマンドを失敗させる
        pub fn failing_on(needle: &'static str) -> Self {
            Self::new(move |command| {
                if command.args.iter().any(|a| a == needle) {
                    Err(TaskError::Command {
                        tool: command.label(),
                        exit_code: 1,
                        stderr_tail: format!("{} failed", needle),
                    })
                } else {
                    Ok(CommandOutput::success(""))
                }
            })
        }

        pub fn calls(&self) -> Vec<ToolCommand> {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }

        pub fn call_args(&self) -> Vec<Vec<String>> {
            self.calls().into_iter().map(|c| c.args).collect()
        }

        fn record(&self, command: &ToolCommand) -> Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(command.clone());
            (self.handler)(command)
        }
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn exec_with(
            &self,
            command: &ToolCommand,
            mut listener: Option<&mut (dyn for<'l> FnMut(&'l str) + Send)>,
        ) -> Result<CommandOutput> {
            let output = self.record(command)?;
            if let Some(listener) = listener.as_deref_mut() {
                for line in output.stdout.lines() {
                    listener(line);
                }
            }
            Ok(output)
        }

        fn exec_blocking(&self, command: &ToolCommand) -> Result<CommandOutput> {
            self.record(command)
        }
    }
}

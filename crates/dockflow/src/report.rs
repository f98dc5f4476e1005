//! パイプラインホスト向けのロギングコマンド
//!
//! ホストは stdout の `##vso[...]` 行を解釈します。それ以外の行は
//! 通常のタスクログです。

use dockflow_session::TaskError;

/// メッセージ本文を 1 行のロギングコマンドに収まるようエスケープ
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(';', "%3B").replace(']', "%5D")
}

pub fn set_variable_line(name: &str, value: &str) -> String {
    format!(
        "##vso[task.setvariable variable={};]{}",
        escape_property(name),
        escape_data(value)
    )
}

pub fn succeeded_line() -> String {
    "##vso[task.complete result=Succeeded;]".to_string()
}

pub fn failed_lines(message: &str) -> [String; 2] {
    let message = escape_data(message);
    [
        format!("##vso[task.logissue type=error;]{}", message),
        format!("##vso[task.complete result=Failed;]{}", message),
    ]
}

pub fn set_variable(name: &str, value: &str) {
    println!("{}", set_variable_line(name, value));
}

pub fn complete_succeeded() {
    println!("{}", succeeded_line());
}

pub fn complete_failed(message: &str) {
    for line in failed_lines(message) {
        println!("{}", line);
    }
}

/// 1 行の失敗メッセージ
///
/// コマンドが失敗した場合はツールの stderr 最終行、それ以外はエラー自体。
pub fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<TaskError>() {
        Some(task_error) => task_error.user_message(),
        None => err.to_string(),
    }
}

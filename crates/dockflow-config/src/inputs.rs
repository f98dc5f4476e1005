//! タスク入力プロバイダ
//!
//! パイプラインホストがタスクに渡す値（入力、サービスエンドポイントの URL と
//! 認証パラメータ、パイプライン変数）を読み取ります。ホストはこれらを環境変数
//! として公開するため、環境のスナップショットを一度だけ取り、以降の参照は
//! すべてそこから返します。

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

const INPUT_PREFIX: &str = "INPUT_";
const ENDPOINT_URL_PREFIX: &str = "ENDPOINT_URL_";
const ENDPOINT_AUTH_PREFIX: &str = "ENDPOINT_AUTH_PARAMETER_";

/// タスク入力のスナップショット
#[derive(Debug, Clone, Default)]
pub struct TaskInputs {
    vars: HashMap<String, String>,
}

/// パイプライン外でタスクを実行するための YAML 上書きファイル
///
/// ```yaml
/// inputs:
///   action: Build an image
///   imageName: app:v1
/// variables:
///   Build.SourceVersion: 3f2a9c1
/// endpoints:
///   dockerhost:
///     url: tcp://build-host:2376/
///     auth:
///       cacert: "-----BEGIN CERTIFICATE-----..."
/// ```
#[derive(Debug, Default, Deserialize)]
struct InputsFile {
    #[serde(default)]
    inputs: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    variables: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    endpoints: BTreeMap<String, EndpointEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct EndpointEntry {
    url: Option<String>,
    #[serde(default)]
    auth: BTreeMap<String, serde_yaml::Value>,
}

impl TaskInputs {
    /// 現在のプロセス環境を取り込む
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// キーと値の組から作成（キーはホストの命名規則済み）
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// YAML 入力ファイルの値で上書き（ファイル側が優先）
    pub fn with_inputs_file(mut self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::InputsFile {
            path: path.to_path_buf(),
            source,
        })?;
        let file: InputsFile =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::InputsFileParse {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!("Loaded inputs file {}", path.display());

        for (name, value) in file.inputs {
            self.vars
                .insert(format!("{}{}", INPUT_PREFIX, env_key(&name)), scalar(&value));
        }
        for (name, value) in file.variables {
            self.vars.insert(env_key(&name), scalar(&value));
        }
        for (id, endpoint) in file.endpoints {
            let id_key = env_key(&id);
            if let Some(url) = endpoint.url {
                self.vars
                    .insert(format!("{}{}", ENDPOINT_URL_PREFIX, id_key), url);
            }
            for (param, value) in endpoint.auth {
                self.vars.insert(
                    format!("{}{}_{}", ENDPOINT_AUTH_PREFIX, id_key, env_key(&param)),
                    scalar(&value),
                );
            }
        }

        Ok(self)
    }

    /// 入力を読む。未設定・空白のみの値は未指定扱い
    pub fn input(&self, name: &str, required: bool) -> Result<Option<String>> {
        let value = self
            .vars
            .get(&format!("{}{}", INPUT_PREFIX, env_key(name)))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        match value {
            None if required => Err(ConfigError::MissingInput(name.to_string())),
            other => Ok(other),
        }
    }

    pub fn required_input(&self, name: &str) -> Result<String> {
        self.input(name, true)?
            .ok_or_else(|| ConfigError::MissingInput(name.to_string()))
    }

    /// 真偽値入力。大文字小文字を問わず `true` のときだけ真
    pub fn bool_input(&self, name: &str) -> bool {
        self.bool_input_or(name, false)
    }

    pub fn bool_input_or(&self, name: &str, default: bool) -> bool {
        match self.input(name, false) {
            Ok(Some(value)) => value.eq_ignore_ascii_case("true"),
            _ => default,
        }
    }

    /// `delimiter` で分割し、各要素をトリムして空要素を除く
    pub fn delimited_input(&self, name: &str, delimiter: char) -> Vec<String> {
        match self.input(name, false) {
            Ok(Some(value)) => value
                .split(delimiter)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn path_input(&self, name: &str, required: bool) -> Result<Option<PathBuf>> {
        Ok(self.input(name, required)?.map(PathBuf::from))
    }

    /// パス入力が指定済みかどうか
    ///
    /// ホストが既定値として入れるソースディレクトリと同じ値は未指定とみなす。
    pub fn file_path_supplied(&self, name: &str) -> bool {
        let Ok(Some(value)) = self.input(name, false) else {
            return false;
        };
        match self.variable("Build.SourcesDirectory") {
            Some(sources) => Path::new(&value) != Path::new(&sources),
            None => true,
        }
    }

    /// 必須のパターン入力を、最初に一致したファイルに解決
    pub fn glob_first(&self, name: &str) -> Result<PathBuf> {
        let pattern = self.required_input(name)?;
        let mut matches = glob::glob(&pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;

        match matches.find_map(|entry| entry.ok()) {
            Some(path) => {
                tracing::debug!("Input '{}' matched {}", name, path.display());
                Ok(path)
            }
            None => Err(ConfigError::NoMatchingFile {
                input: name.to_string(),
                pattern,
            }),
        }
    }

    pub fn endpoint_url(&self, endpoint: &str, optional: bool) -> Result<Option<String>> {
        let url = self
            .vars
            .get(&format!("{}{}", ENDPOINT_URL_PREFIX, env_key(endpoint)))
            .filter(|v| !v.trim().is_empty())
            .cloned();

        match url {
            None if !optional => Err(ConfigError::MissingEndpointUrl {
                endpoint: endpoint.to_string(),
            }),
            other => Ok(other),
        }
    }

    /// エンドポイントの認証パラメータ（キーは小文字化）
    pub fn endpoint_authorization(
        &self,
        endpoint: &str,
        optional: bool,
    ) -> Result<Option<HashMap<String, String>>> {
        let prefix = format!("{}{}_", ENDPOINT_AUTH_PREFIX, env_key(endpoint));
        let parameters: HashMap<String, String> = self
            .vars
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(&prefix)
                    .map(|param| (param.to_lowercase(), v.clone()))
            })
            .collect();

        if parameters.is_empty() {
            if optional {
                return Ok(None);
            }
            return Err(ConfigError::MissingEndpointAuth {
                endpoint: endpoint.to_string(),
            });
        }

        Ok(Some(parameters))
    }

    /// `Build.SourceVersion` などのパイプライン変数
    pub fn variable(&self, name: &str) -> Option<String> {
        self.vars
            .get(&env_key(name))
            .filter(|v| !v.is_empty())
            .cloned()
    }
}

/// ホストの命名規則: 大文字化し、`.` と空白を `_` に置換
fn env_key(name: &str) -> String {
    name.replace(['.', ' '], "_").to_uppercase()
}

fn scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .map(scalar)
            .collect::<Vec<_>>()
            .join("\n"),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other).unwrap_or_default(),
    }
}

//! セッションの接続先エンドポイント

use std::collections::HashMap;

/// Docker Hub のレジストリホスト（このホストではイメージ名を修飾しない）
pub const DOCKER_HUB_REGISTRY: &str = "index.docker.io";

/// TLS で接続するリモート Docker デーモン
#[derive(Debug, Clone)]
pub struct DaemonEndpoint {
    url: String,
    parameters: HashMap<String, String>,
}

impl DaemonEndpoint {
    /// `parameters` は `cacert`、`cert`、`key` に PEM を持つ
    pub fn new(url: impl Into<String>, parameters: HashMap<String, String>) -> Self {
        let mut url = url.into();
        if url.ends_with('/') {
            url.pop();
        }
        Self { url, parameters }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

/// イメージレジストリとログインに使うアカウント
#[derive(Debug, Clone)]
pub struct RegistryEndpoint {
    pub registry: String,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

impl RegistryEndpoint {
    /// エンドポイントの認証パラメータから作成
    ///
    /// `username` / `password` が無い場合は空のまま保持する（ログイン時にレジストリが拒否する）。
    pub fn from_parameters(parameters: &HashMap<String, String>) -> Self {
        let get = |key: &str| parameters.get(key).cloned().unwrap_or_default();
        Self {
            registry: get("registry"),
            username: get("username"),
            password: get("password"),
            email: parameters.get("email").cloned().filter(|e| !e.is_empty()),
        }
    }

    /// スキームとパスを除いたレジストリのホスト名
    ///
    /// # Examples
    /// - `https://myreg.azurecr.io/` -> `myreg.azurecr.io`
    /// - `https://index.docker.io/v1/` -> `index.docker.io`
    /// - `localhost:5000` -> `localhost:5000`
    pub fn hostname(&self) -> &str {
        let without_scheme = match self.registry.find("://") {
            Some(pos) => &self.registry[pos + 3..],
            None => self.registry.as_str(),
        };
        without_scheme
            .split('/')
            .next()
            .unwrap_or(without_scheme)
    }

    pub fn is_docker_hub(&self) -> bool {
        self.hostname().eq_ignore_ascii_case(DOCKER_HUB_REGISTRY)
    }
}

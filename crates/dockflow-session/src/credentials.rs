//! リモート Docker デーモン用の TLS クライアント証明書
//!
//! デーモンエンドポイントの PEM を専用ディレクトリに書き出します。
//! ディレクトリの寿命はそれを使うセッションと同じです。

use crate::endpoint::DaemonEndpoint;
use crate::error::{Result, TaskError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CA_FILE: &str = "ca.pem";
pub const CERT_FILE: &str = "cert.pem";
pub const KEY_FILE: &str = "key.pem";

const CERTS_DIR_PREFIX: &str = ".dockercerts-";

/// ルートディレクトリ配下にデーモン証明書を書き出す
#[derive(Debug, Clone)]
pub struct CredentialProvisioner {
    root: PathBuf,
}

impl CredentialProvisioner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `endpoint` の `ca.pem`、`cert.pem`、`key.pem` を書き出す
    ///
    /// ディスクに触れる前にパラメータを検証するため、拒否された場合は
    /// ディレクトリが残らない。
    pub fn provision(&self, endpoint: &DaemonEndpoint) -> Result<CredentialBundle> {
        let missing: Vec<&str> = ["cacert", "cert", "key"]
            .into_iter()
            .filter(|name| endpoint.parameter(name).is_none_or(str::is_empty))
            .collect();
        if !missing.is_empty() {
            return Err(TaskError::Credential(format!(
                "endpoint {} is missing {}",
                endpoint.url(),
                missing.join(", ")
            )));
        }

        let dir = self.root.join(format!(
            "{}{}",
            CERTS_DIR_PREFIX,
            uuid::Uuid::new_v4().simple()
        ));
        create_private_dir(&dir)?;

        let bundle = CredentialBundle {
            ca_path: dir.join(CA_FILE),
            cert_path: dir.join(CERT_FILE),
            key_path: dir.join(KEY_FILE),
            dir,
            disposed: false,
        };

        // 失敗時はここで bundle が drop され、書き出した分も削除される
        write_pem(&bundle.ca_path, endpoint.parameter("cacert").unwrap_or_default(), false)?;
        write_pem(&bundle.cert_path, endpoint.parameter("cert").unwrap_or_default(), false)?;
        write_pem(&bundle.key_path, endpoint.parameter("key").unwrap_or_default(), true)?;

        tracing::debug!("Wrote daemon credentials to {}", bundle.dir.display());
        Ok(bundle)
    }
}

/// 1 セッション分の 3 つの PEM ファイル
#[derive(Debug)]
pub struct CredentialBundle {
    dir: PathBuf,
    ca_path: PathBuf,
    cert_path: PathBuf,
    key_path: PathBuf,
    disposed: bool,
}

impl CredentialBundle {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ca_path(&self) -> &Path {
        &self.ca_path
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// 証明書ディレクトリを削除
    ///
    /// 冪等。既に存在しない場合もエラーにしない。
    pub fn dispose(&mut self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::debug!("Removed daemon credentials at {}", self.dir.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(TaskError::filesystem(&self.dir, e)),
        }
        self.disposed = true;
        Ok(())
    }
}

impl Drop for CredentialBundle {
    fn drop(&mut self) {
        if !self.disposed
            && let Err(e) = self.dispose()
        {
            tracing::warn!("Failed to remove daemon credentials: {}", e);
        }
    }
}

fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    match builder.create(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(TaskError::filesystem(dir, e)),
    }
}

/// PEM ファイルをそのまま書き出す（古いファイルは上書き）
fn write_pem(path: &Path, content: &str, private: bool) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options
        .open(path)
        .map_err(|e| TaskError::filesystem(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| TaskError::filesystem(path, e))
}

//! push / pull の出力から取り出すダイジェスト
//!
//! docker CLI はダイジェストを人間向けのテキストでしか出力しません。
//! 一致する行が無い場合は「ダイジェストなし」として扱い、エラーにはしません。

use crate::image::image_name_without_tag;
use regex::Regex;
use std::sync::LazyLock;

static PUSH_DIGEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[^:\r\n]*: digest: ([^ \r\n]+) size: \d*\r?$").expect("valid push digest pattern")
});

static PULL_DIGEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Digest: ([^ \r\n]+)\r?$").expect("valid pull digest pattern")
});

/// 出力元のコマンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestSource {
    /// `<tag>: digest: <digest> size: <n>`
    Push,
    /// `Digest: <digest>`
    Pull,
}

/// ダイジェストとタグなしのリポジトリ名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResult {
    pub repository: String,
    pub digest: String,
}

impl DigestResult {
    /// デプロイで固定に使う `repository@digest`
    pub fn pinned_reference(&self) -> String {
        format!("{}@{}", self.repository, self.digest)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DigestExtractor {
    source: DigestSource,
}

impl DigestExtractor {
    pub fn new(source: DigestSource) -> Self {
        Self { source }
    }

    pub fn push() -> Self {
        Self::new(DigestSource::Push)
    }

    pub fn pull() -> Self {
        Self::new(DigestSource::Pull)
    }

    /// `output` に最初に現れるダイジェスト
    pub fn digest<'a>(&self, output: &'a str) -> Option<&'a str> {
        let pattern = match self.source {
            DigestSource::Push => &*PUSH_DIGEST,
            DigestSource::Pull => &*PULL_DIGEST,
        };
        pattern
            .captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// `output` 中の `image` のダイジェスト（タグなしの名前と組にする）
    pub fn extract(&self, image: &str, output: &str) -> Option<DigestResult> {
        match self.digest(output) {
            Some(digest) => {
                let result = DigestResult {
                    repository: image_name_without_tag(image).to_string(),
                    digest: digest.to_string(),
                };
                tracing::info!("Image digest: {}", result.pinned_reference());
                Some(result)
            }
            None => {
                tracing::info!("No digest reported for {}", image);
                None
            }
        }
    }
}

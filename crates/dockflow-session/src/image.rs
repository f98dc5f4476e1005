//! イメージ参照の操作とタグの決定

/// タグ省略時に暗黙に使われるタグ
pub const LATEST_TAG: &str = "latest";

/// イメージ参照からタグ（とダイジェスト）を除去
///
/// レジストリ部分の `:` はポート番号でありタグではない。
///
/// # Examples
/// - `ghcr.io/org/app:v1.0` -> `ghcr.io/org/app`
/// - `localhost:5000/app` -> `localhost:5000/app`
/// - `localhost:5000/app:dev` -> `localhost:5000/app`
/// - `app@sha256:abcd` -> `app`
pub fn image_name_without_tag(image: &str) -> &str {
    let image = match image.find('@') {
        Some(pos) => &image[..pos],
        None => image,
    };
    let name_start = image.rfind('/').map_or(0, |pos| pos + 1);
    match image[name_start..].find(':') {
        Some(pos) => &image[..name_start + pos],
        None => image,
    }
}

/// 参照のタグ部分
pub fn image_tag(image: &str) -> Option<&str> {
    let base = image_name_without_tag(image);
    image[base.len()..]
        .strip_prefix(':')
        .map(|rest| rest.split('@').next().unwrap_or(rest))
        .filter(|tag| !tag.is_empty())
}

/// 先頭のパス要素がレジストリホストかどうか
///
/// # Examples
/// - `ghcr.io/org/app` -> true
/// - `localhost:5000/app` -> true
/// - `myuser/app` -> false
/// - `nginx` -> false
pub fn has_registry_component(image: &str) -> bool {
    match image.split_once('/') {
        Some((first, _)) => first.contains('.') || first.contains(':') || first == "localhost",
        None => false,
    }
}

/// プッシュ時の参照。タグなしは `:latest` としてプッシュする
pub fn push_reference(image: &str) -> String {
    if image_name_without_tag(image) == image {
        format!("{}:{}", image, LATEST_TAG)
    } else {
        image.to_string()
    }
}

/// 追加タグを決める入力
#[derive(Debug, Clone, Default)]
pub struct TagPolicy {
    /// 明示的なタグ（設定順）
    pub additional_tags: Vec<String>,
    /// ソースコミットに付いたタグ（解決済み）
    pub source_tags: Vec<String>,
    /// イメージにタグがある場合に `latest` の別名を付ける
    pub include_latest: bool,
}

impl TagPolicy {
    /// `build` でイメージ名の後に付ける `-t` の値
    ///
    /// 順序は追加タグ、ソースタグ、latest 別名としてのベース名。
    /// 別名はタグ付きのイメージにだけ付ける。
    pub fn build_tags(&self, image: &str) -> Vec<String> {
        let base = image_name_without_tag(image);
        let mut tags = self.derived_tags(base);
        if self.include_latest && image_tag(image).is_some() {
            tags.push(base.to_string());
        }
        tags
    }

    /// プッシュする全参照（プッシュ順）
    ///
    /// 先頭はイメージ自身（タグなしなら `:latest`）。続いて追加タグ、
    /// ソースタグ、`base:latest` の順。
    pub fn push_references(&self, image: &str) -> Vec<String> {
        let base = image_name_without_tag(image);
        let mut references = vec![push_reference(image)];
        references.extend(self.derived_tags(base));
        if self.include_latest && image_tag(image).is_some() {
            references.push(format!("{}:{}", base, LATEST_TAG));
        }
        references
    }

    fn derived_tags(&self, base: &str) -> Vec<String> {
        self.additional_tags
            .iter()
            .chain(self.source_tags.iter())
            .map(|tag| format!("{}:{}", base, tag))
            .collect()
    }
}

//! dockflow のパイプラインタスク設定
//!
//! パイプラインホストはタスク入力・サービスエンドポイント・パイプライン変数を
//! 環境変数で渡します。[`TaskInputs`] はそれらを読み取り、ローカル実行用に
//! YAML 入力ファイルで上書きできます。

pub mod error;
pub mod inputs;

pub use error::*;
pub use inputs::TaskInputs;

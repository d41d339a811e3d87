//! 照合前のテキスト正規化モジュール
//!
//! ## 処理
//! 1. 合字・PUA文字の修復（`glyph`）
//! 2. 照合キー化（小文字化・空白/記号除去）
//! 3. 補助表の値の正規化（`value`）

pub mod glyph;
pub mod value;

pub use glyph::{normalize, normalize_with_log, GlyphLog};
pub use value::{NormalizedValue, SwimLevel, ValueDomain};

/// 照合キーから除去する記号
const KEY_PUNCTUATION: [char; 5] = [',', '.', ':', '-', '\''];

/// 姓の照合キーを作る
///
/// 合字修復 → 小文字化 → 空白と `,.:-'` を除去。
/// 名簿側とドキュメント側の両方に同じ処理を使う。
pub fn match_key(text: &str, log: &mut GlyphLog) -> String {
    normalize_with_log(text, log)
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !KEY_PUNCTUATION.contains(c))
        .collect()
}

/// 小文字化・空白の連続を1つに
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

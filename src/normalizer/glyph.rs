//! 合字・私用領域（PUA）文字の修復
//!
//! 抽出テキストを照合キーに使う前に通す。処理順:
//! 1. 標準合字（U+FB00〜U+FB06）を展開
//! 2. 表に無いPUA文字は "tt" に置換し、`GlyphLog` に記録
//! 3. ゼロ幅・不可視の書式文字を削除
//! 4. 同じ文字が3回以上続く箇所を2文字に縮める
//!
//! 4 は生徒名専用の前提（3連続の同一文字を持つ姓は無い）に依存する。
//! 一般の文章に使うと正当な綴りを壊す。

use std::collections::BTreeSet;

/// 標準合字と展開後の文字列
pub const LIGATURES: [(char, &str); 7] = [
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FB05}', "st"),
    ('\u{FB06}', "st"),
];

/// 削除する不可視文字
const INVISIBLE: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// 未知のPUA文字の置換先
const PUA_FALLBACK: &str = "tt";

/// 実行中に出現したPUA文字の記録（照合結果には影響しない）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphLog {
    seen: BTreeSet<char>,
}

impl GlyphLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, c: char) {
        self.seen.insert(c);
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn contains(&self, c: char) -> bool {
        self.seen.contains(&c)
    }

    pub fn extend(&mut self, other: &GlyphLog) {
        self.seen.extend(other.seen.iter().copied());
    }

    /// `U+E000` 形式の一覧（コードポイント順）
    pub fn code_points(&self) -> Vec<String> {
        self.seen.iter().map(|c| format_code_point(*c)).collect()
    }

    /// 診断ログに出力
    pub fn dump(&self) {
        if self.seen.is_empty() {
            log::info!("PUA文字は検出されませんでした");
            return;
        }
        log::info!("検出したPUA文字（すべて '{}' として扱った）:", PUA_FALLBACK);
        for c in &self.seen {
            log::info!("  {}", format_code_point(*c));
        }
    }
}

pub fn format_code_point(c: char) -> String {
    format!("U+{:04X}", c as u32)
}

/// 文字列を正規化する（PUA文字の記録は破棄）
pub fn normalize(text: &str) -> String {
    normalize_with_log(text, &mut GlyphLog::new())
}

/// 文字列を正規化し、出現したPUA文字を `log` に記録する
pub fn normalize_with_log(text: &str, log: &mut GlyphLog) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        if let Some(expansion) = ligature(c) {
            out.push_str(expansion);
        } else if is_private_use(c) {
            log.record(c);
            out.push_str(PUA_FALLBACK);
        } else if INVISIBLE.contains(&c) {
            continue;
        } else {
            out.push(c);
        }
    }

    collapse_letter_runs(&out)
}

fn same_letter(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn ligature(c: char) -> Option<&'static str> {
    LIGATURES
        .iter()
        .find(|(lig, _)| *lig == c)
        .map(|(_, expansion)| *expansion)
}

pub fn is_private_use(c: char) -> bool {
    ('\u{E000}'..='\u{F8FF}').contains(&c)
}

/// 同じ文字の3連続以上を2文字に縮める（大文字小文字は区別しない）
pub fn collapse_letter_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut run = 0;

    for c in text.chars() {
        if prev.is_some_and(|p| same_letter(p, c)) {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run > 2 && c.is_alphabetic() {
            continue;
        }
        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ligature_expansion() {
        assert_eq!(normalize("\u{FB01}nn"), "finn");
        assert_eq!(normalize("Ra\u{FB00}erty"), "Rafferty");
        assert_eq!(normalize("\u{FB03}\u{FB04}"), "ffiffl");
        assert_eq!(normalize("\u{FB05}\u{FB06}"), "stst");
    }

    #[test]
    fn test_ligature_followed_by_artifact_run() {
        assert_eq!(normalize("\u{FB01}tttt"), "fitt");
    }

    #[test]
    fn test_pua_becomes_tt_and_is_logged() {
        let mut log = GlyphLog::new();
        assert_eq!(normalize_with_log("Ma\u{E03A}hew", &mut log), "Matthew");
        assert!(log.contains('\u{E03A}'));
        assert_eq!(log.code_points(), vec!["U+E03A".to_string()]);
    }

    #[test]
    fn test_pua_with_phantom_duplicates() {
        // PUA + 抽出時に重複した "tt" → "tttt" → "tt"
        assert_eq!(normalize("Ma\u{F001}tthew"), "Matthew");
    }

    #[test]
    fn test_invisible_chars_dropped() {
        assert_eq!(normalize("Gr\u{200B}ay\u{FEFF}"), "Gray");
        assert_eq!(normalize("\u{200C}\u{200D}"), "");
    }

    #[test]
    fn test_collapse_letters_only() {
        assert_eq!(collapse_letter_runs("aaab"), "aab");
        assert_eq!(collapse_letter_runs("1111"), "1111");
        assert_eq!(collapse_letter_runs("Aaa"), "Aa");
        assert_eq!(collapse_letter_runs("Ttt"), "Tt");
        assert_eq!(collapse_letter_runs("bookkeeper"), "bookkeeper");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(normalize("O'Brien-Smith"), "O'Brien-Smith");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_logs_are_independent_per_run() {
        let mut first = GlyphLog::new();
        let mut second = GlyphLog::new();
        normalize_with_log("\u{E000}", &mut first);
        normalize_with_log("abc", &mut second);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}

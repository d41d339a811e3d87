//! 姓の出現数インデックス
//!
//! 同じ姓の生徒が2人以上いる場合は名（または通称）での絞り込みが必要。

use crate::normalizer::{match_key, GlyphLog};
use roster_match_common::RosterEntry;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SurnameIndex {
    counts: HashMap<String, usize>,
}

impl SurnameIndex {
    /// 名簿から構築（空の姓は数えない）
    pub fn build(roster: &[RosterEntry]) -> Self {
        let mut counts = HashMap::new();
        for entry in roster {
            let key = surname_key(&entry.surname);
            if !key.is_empty() {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        Self { counts }
    }

    pub fn count(&self, surname: &str) -> usize {
        self.counts.get(&surname_key(surname)).copied().unwrap_or(0)
    }

    /// 姓だけでは特定できないか
    pub fn is_duplicate(&self, surname: &str) -> bool {
        self.count(surname) > 1
    }

    /// 重複している姓の一覧（ソート済み）
    pub fn duplicates(&self) -> Vec<&str> {
        let mut dups: Vec<&str> = self
            .counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(surname, _)| surname.as_str())
            .collect();
        dups.sort();
        dups
    }
}

/// 大文字小文字・空白・記号を無視した姓のキー
fn surname_key(surname: &str) -> String {
    match_key(surname.trim(), &mut GlyphLog::new())
}

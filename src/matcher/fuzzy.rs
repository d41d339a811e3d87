//! 補助表（水泳能力・食事制限）と名簿の照合
//!
//! 名簿の生徒ごとに、未使用の補助表の行を上から順に調べる。
//! - 姓が一意: 生徒名に姓が単語として含まれれば一致
//! - 姓が重複: 姓に加えて名、または通称が単語として含まれること
//!
//! 一致した行は使用済みとなり、以降の生徒には使わない。
//! 最後まで使われなかった行は手動割当用に未照合として返す。

use super::surname::SurnameIndex;
use super::types::{Locator, MatchKey, MatchResult, Payload, SourceOutcome, UnmatchedRecord};
use crate::config::AuxTableConfig;
use crate::error::{Result, RosterMatchError};
use crate::normalizer::{normalize_whitespace, normalize_with_log, GlyphLog, NormalizedValue, ValueDomain};
use regex::Regex;
use roster_match_common::{AuxRow, RosterEntry, Table};
use std::collections::BTreeMap;
use std::path::Path;

/// 一致の根拠
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    UniqueSurname,
    FirstName,
    PreferredName,
}

impl std::fmt::Display for NameMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameMatch::UniqueSurname => write!(f, "一意の姓"),
            NameMatch::FirstName => write!(f, "姓 + 名"),
            NameMatch::PreferredName => write!(f, "姓 + 通称"),
        }
    }
}

/// 照合前に整えた行
struct PreparedRow {
    name_text: String,
    value: NormalizedValue,
}

/// 名簿の生徒ごとの単語パターン
struct EntryPatterns {
    surname: Regex,
    first: Option<Regex>,
    preferred: Option<Regex>,
}

impl EntryPatterns {
    fn build(entry: &RosterEntry) -> Option<Self> {
        Some(Self {
            surname: word_pattern(&entry.surname)?,
            first: word_pattern(&entry.first_name),
            preferred: entry.preferred().and_then(word_pattern),
        })
    }

    /// 行の生徒名がこの生徒を指すか
    fn check(&self, name_text: &str, duplicate_surname: bool) -> Option<NameMatch> {
        if !self.surname.is_match(name_text) {
            return None;
        }
        if !duplicate_surname {
            return Some(NameMatch::UniqueSurname);
        }
        if self.first.as_ref().is_some_and(|re| re.is_match(name_text)) {
            return Some(NameMatch::FirstName);
        }
        if self.preferred.as_ref().is_some_and(|re| re.is_match(name_text)) {
            return Some(NameMatch::PreferredName);
        }
        None
    }
}

/// 単語境界つきの大文字小文字を無視するパターン（空なら None）
fn word_pattern(text: &str) -> Option<Regex> {
    let text = normalize_whitespace(text);
    if text.is_empty() {
        return None;
    }
    match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&text))) {
        Ok(re) => Some(re),
        Err(e) => {
            log::warn!("名前パターンを作成できません '{}': {}", text, e);
            None
        }
    }
}

/// 名簿と補助表の照合器
#[derive(Debug, Clone, Copy)]
pub struct RosterMatcher {
    domain: ValueDomain,
}

impl RosterMatcher {
    pub fn new(domain: ValueDomain) -> Self {
        Self { domain }
    }

    /// 行を名簿と照合する
    ///
    /// # Arguments
    /// * `roster` - 名簿（名簿順に処理する）
    /// * `rows` - 補助表の行（この順で先に見つかった行を採用）
    pub fn match_rows(&self, roster: &[RosterEntry], rows: &[AuxRow]) -> SourceOutcome {
        let index = SurnameIndex::build(roster);
        let mut glyphs = GlyphLog::new();

        let duplicates = index.duplicates();
        log::info!(
            "[{}] 行数 {} / 生徒数 {} / 重複姓 {}件",
            self.domain,
            rows.len(),
            roster.len(),
            duplicates.len()
        );
        if !duplicates.is_empty() {
            log::debug!("  重複姓: {}", duplicates.join(", "));
        }

        let prepared: Vec<PreparedRow> = rows
            .iter()
            .map(|row| PreparedRow {
                name_text: normalize_whitespace(&normalize_with_log(&row.name, &mut glyphs)),
                value: self.domain.normalize(&row.value),
            })
            .collect();

        let mut claimed = vec![false; prepared.len()];
        let mut matches = MatchResult::new();

        for entry in roster {
            if entry.surname.trim().is_empty() {
                continue;
            }
            let Some(patterns) = EntryPatterns::build(entry) else {
                continue;
            };
            let duplicate = index.is_duplicate(&entry.surname);

            let found = prepared.iter().enumerate().find_map(|(i, row)| {
                if claimed[i] || !row.value.is_matchable() {
                    return None;
                }
                patterns.check(&row.name_text, duplicate).map(|how| (i, how))
            });

            match found {
                Some((i, how)) => {
                    claimed[i] = true;
                    matches.insert(MatchKey::Row(i), entry.student_id.clone());
                    log::debug!(
                        "✓ {} → 行{} '{}' ({})",
                        entry.display_name(),
                        i,
                        rows[i].name,
                        how
                    );
                }
                None if duplicate => {
                    log::debug!(
                        "✗ {} 重複姓のため姓 + 名/通称での一致が必要",
                        entry.display_name()
                    );
                }
                None => {
                    log::debug!("✗ {} 一意の姓だが表に見つからない", entry.display_name());
                }
            }
        }

        let mut values = BTreeMap::new();
        let mut unmatched = Vec::new();
        for (i, row) in prepared.iter().enumerate() {
            if let Some(text) = row.value.text() {
                values.insert(i, text.to_string());
            }
            if claimed[i] {
                continue;
            }
            let name = rows[i].name.trim();
            if !row.value.is_reportable() || name.is_empty() {
                continue;
            }
            let Some(text) = row.value.text() else {
                continue;
            };
            unmatched.push(UnmatchedRecord {
                source_text: name.to_string(),
                payload: Payload::Value(text.to_string()),
                locator: Locator::Row(i),
            });
        }

        log::info!(
            "[{}] 照合 {}件 / 手動割当待ち {}件",
            self.domain,
            matches.len(),
            unmatched.len()
        );

        SourceOutcome {
            matches,
            unmatched,
            values,
            glyphs,
            ..Default::default()
        }
    }

    /// 表を名簿と照合する（列が見つからなければ設定エラー）
    pub fn match_table(
        &self,
        roster: &[RosterEntry],
        table: &Table,
        config: &AuxTableConfig,
    ) -> Result<SourceOutcome> {
        let rows = table_rows(table, config, self.domain)?;
        Ok(self.match_rows(roster, &rows))
    }
}

/// 補助表CSVを読み込む（列名の置き換え設定があれば適用）
pub fn read_aux_table(path: &Path, config: &AuxTableConfig) -> Result<Table> {
    if !path.exists() {
        return Err(RosterMatchError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(match &config.column_names {
        Some(names) => Table::from_csv_str_with_names(&content, names),
        None => Table::from_csv_str(&content),
    })
}

/// 表から (生徒名, 値) の行を取り出す
pub fn table_rows(table: &Table, config: &AuxTableConfig, domain: ValueDomain) -> Result<Vec<AuxRow>> {
    let name_col = table.require_column("name", &config.name_columns)?;
    let value_col = value_column(table, config, domain)?;

    Ok((0..table.len())
        .map(|row| AuxRow::new(table.cell(row, name_col), table.cell(row, value_col)))
        .collect())
}

/// 値列を決める
///
/// キーワードが設定されている場合、先頭行の値にどれも含まれなければ
/// 見出しのない列、それも無ければ最後の列を使う。
/// キーワードが無い場合も、値列が全行とも空欄扱いで見出しのない列に
/// 値があれば、見出しが1列ずれているとみなしてそちらを使う。
fn value_column(table: &Table, config: &AuxTableConfig, domain: ValueDomain) -> Result<usize> {
    let col = table.require_column("value", &config.value_columns)?;
    if table.is_empty() {
        return Ok(col);
    }

    if !config.value_keywords.is_empty() {
        let sample = table.cell(0, col).to_lowercase();
        if config
            .value_keywords
            .iter()
            .any(|k| sample.contains(&k.to_lowercase()))
        {
            return Ok(col);
        }
        let fallback = table
            .first_unnamed_column()
            .unwrap_or_else(|| table.headers().len().saturating_sub(1));
        warn_value_column(table, col, fallback);
        return Ok(fallback);
    }

    if has_values(table, col, domain) {
        return Ok(col);
    }
    match table.first_unnamed_column() {
        Some(unnamed) if has_values(table, unnamed, domain) => {
            warn_value_column(table, col, unnamed);
            Ok(unnamed)
        }
        _ => Ok(col),
    }
}

/// 列に空欄扱いでない値が1つでもあるか
fn has_values(table: &Table, col: usize, domain: ValueDomain) -> bool {
    (0..table.len()).any(|row| domain.normalize(table.cell(row, col)).is_reportable())
}

fn warn_value_column(table: &Table, col: usize, fallback: usize) {
    log::warn!(
        "値列 '{}' に想定した値がありません。'{}' を使用します",
        table.headers()[col],
        table.headers().get(fallback).map(String::as_str).unwrap_or("")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, surname: &str, first: &str) -> RosterEntry {
        RosterEntry {
            student_id: id.into(),
            surname: surname.into(),
            first_name: first.into(),
            ..Default::default()
        }
    }

    fn swim() -> RosterMatcher {
        RosterMatcher::new(ValueDomain::Swimming)
    }

    #[test]
    fn test_unique_surname_match() {
        let roster = vec![student("1", "Gray", "Jessica")];
        let rows = vec![AuxRow::new("Jessica Gray", "Strong swimmer")];
        let outcome = swim().match_rows(&roster, &rows);

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches.get(&MatchKey::Row(0)), Some("1"));
        assert!(outcome.unmatched.is_empty());
    }

    #[test]
    fn test_no_substring_bleed() {
        let roster = vec![student("1", "Bell", "")];
        let rows = vec![AuxRow::new("Isabella Smith", "Weak swimmer")];
        let outcome = swim().match_rows(&roster, &rows);

        assert!(outcome.matches.is_empty());
        assert_eq!(
            outcome.unmatched,
            vec![UnmatchedRecord {
                source_text: "Isabella Smith".into(),
                payload: Payload::Value("Weak swimmer".into()),
                locator: Locator::Row(0),
            }]
        );
    }

    #[test]
    fn test_whole_word_surname_matches() {
        let roster = vec![student("1", "Bell", "Tom")];
        let rows = vec![AuxRow::new("bella jones", "Fair"), AuxRow::new("Tom BELL ", "Fair")];
        let outcome = swim().match_rows(&roster, &rows);
        assert_eq!(outcome.matches.get(&MatchKey::Row(1)), Some("1"));
        assert!(!outcome.matches.contains_key(&MatchKey::Row(0)));
    }

    #[test]
    fn test_duplicate_surname_needs_first_name() {
        let roster = vec![student("1", "Gray", "Jessica"), student("2", "Gray", "George")];
        let rows = vec![AuxRow::new("George Gray", "Weak swimmer")];
        let outcome = swim().match_rows(&roster, &rows);

        assert_eq!(outcome.matches.get(&MatchKey::Row(0)), Some("2"));
        assert_eq!(outcome.matches.keys_for("1").len(), 0);
    }

    #[test]
    fn test_duplicate_surname_preferred_name() {
        let mut jess = student("1", "Gray", "Jessica");
        jess.preferred_name = Some("Jess".into());
        let roster = vec![jess, student("2", "Gray", "George")];
        let rows = vec![AuxRow::new("Jess Gray", "Competent")];
        let outcome = swim().match_rows(&roster, &rows);
        assert_eq!(outcome.matches.get(&MatchKey::Row(0)), Some("1"));
    }

    #[test]
    fn test_duplicate_surname_without_name_stays_unmatched() {
        let roster = vec![student("1", "Gray", "Jessica"), student("2", "Gray", "George")];
        let rows = vec![AuxRow::new("Gray", "Competent")];
        let outcome = swim().match_rows(&roster, &rows);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.unmatched.len(), 1);
    }

    #[test]
    fn test_row_claimed_once() {
        let roster = vec![student("1", "Bell", "Tom"), student("2", "Smith", "Tom")];
        let rows = vec![AuxRow::new("Tom Bell Smith", "Fair")];
        let outcome = swim().match_rows(&roster, &rows);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches.get(&MatchKey::Row(0)), Some("1"));
    }

    #[test]
    fn test_first_unclaimed_row_wins() {
        let roster = vec![student("1", "Bell", "Tom")];
        let rows = vec![AuxRow::new("Tom Bell", "Fair"), AuxRow::new("T. Bell", "Strong")];
        let outcome = swim().match_rows(&roster, &rows);
        assert_eq!(outcome.matches.get(&MatchKey::Row(0)), Some("1"));
        assert_eq!(outcome.unmatched.len(), 1);
        assert_eq!(outcome.unmatched[0].locator, Locator::Row(1));
    }

    #[test]
    fn test_swimming_invalid_rows_skipped() {
        let roster = vec![student("1", "Bell", "Tom")];
        let rows = vec![AuxRow::new("Tom Bell", "Submitted"), AuxRow::new("Tom Bell", "Fair")];
        let outcome = swim().match_rows(&roster, &rows);
        assert_eq!(outcome.matches.get(&MatchKey::Row(1)), Some("1"));
        assert!(outcome.unmatched.is_empty());
    }

    #[test]
    fn test_dietary_placeholder_matches_but_not_reported() {
        let diet = RosterMatcher::new(ValueDomain::Dietary);
        let roster = vec![student("1", "Bell", "Tom")];
        let rows = vec![AuxRow::new("Tom Bell", "n/a"), AuxRow::new("Ann Other", "")];
        let outcome = diet.match_rows(&roster, &rows);

        assert_eq!(outcome.matches.get(&MatchKey::Row(0)), Some("1"));
        assert_eq!(outcome.by_student()["1"], "No concerns listed");
        assert!(outcome.unmatched.is_empty());
    }

    #[test]
    fn test_skip_empty_surname() {
        let roster = vec![student("1", "", "Tom")];
        let rows = vec![AuxRow::new("Tom", "Fair")];
        let outcome = swim().match_rows(&roster, &rows);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let roster = vec![student("1", "Gray", "Jessica"), student("2", "Gray", "George"), student("3", "Bell", "")];
        let rows = vec![
            AuxRow::new("George Gray", "Fair"),
            AuxRow::new("Isabella Smith", "Weak swimmer"),
            AuxRow::new("jessica gray", "Strong"),
        ];
        let first = swim().match_rows(&roster, &rows);
        let second = swim().match_rows(&roster, &rows);
        assert_eq!(first.matches, second.matches);
        assert_eq!(first.unmatched, second.unmatched);
    }

    #[test]
    fn test_missing_column_is_config_error() {
        let table = Table::from_csv_str("Email,Name\na@x,Tom Bell\n");
        let err = swim()
            .match_table(&[], &table, &AuxTableConfig::swimming())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_value_column_fallback_to_unnamed() {
        let csv = "Student,Swimming Ability\nTom Bell,2024-03-01,Strong swimmer\n";
        let table = Table::from_csv_str(csv);
        let rows = table_rows(&table, &AuxTableConfig::swimming(), ValueDomain::Swimming).unwrap();
        assert_eq!(rows, vec![AuxRow::new("Tom Bell", "Strong swimmer")]);
    }

    /// 見出し6列・データ7列の食事表（提出状況の列に見出しが無い）
    #[test]
    fn test_dietary_shifted_header_uses_unnamed_column() {
        let csv = "Email,First Name,Surname,Student,Submission Time,Dietary Requirements\n\
                   a@x,Jessica,Gray,Jessica Gray,2024-03-01,Submitted,Peanut allergy\n\
                   b@x,Tom,Bell,Tom Bell,2024-03-02,Submitted,\n";
        let table = Table::from_csv_str(csv);
        let rows = table_rows(&table, &AuxTableConfig::dietary(), ValueDomain::Dietary).unwrap();
        assert_eq!(rows[0], AuxRow::new("Jessica Gray", "Peanut allergy"));
        assert_eq!(rows[1], AuxRow::new("Tom Bell", ""));
    }

    /// 値列が全て空欄でも見出しのない列に値が無ければそのまま
    #[test]
    fn test_dietary_blank_column_kept_without_unnamed_values() {
        let csv = "Student,Dietary Requirements\nTom Bell,\nAnn Lee,n/a\n";
        let table = Table::from_csv_str(csv);
        let rows = table_rows(&table, &AuxTableConfig::dietary(), ValueDomain::Dietary).unwrap();
        assert_eq!(rows[1], AuxRow::new("Ann Lee", "n/a"));
    }
}

//! 手動割当の重ね合わせ

use super::types::{MatchKey, MatchResult};
use std::collections::BTreeMap;

/// 自動照合結果の複製に手動割当を上書き・追加する
pub fn merge(auto: &MatchResult, manual: &MatchResult) -> MatchResult {
    let mut merged = auto.clone();
    for (key, student_id) in manual.iter() {
        merged.insert(key.clone(), student_id);
    }
    merged
}

/// 生徒ID → 値 に変換する
///
/// 行キーは `values` の値、写真キーはハンドルそのもの。
/// 同じ生徒に複数のキーがある場合は `manual` に含まれるキーが後から適用される。
pub fn project(
    matches: &MatchResult,
    values: &BTreeMap<usize, String>,
    manual: &MatchResult,
) -> BTreeMap<String, String> {
    let mut by_student = BTreeMap::new();

    let (overrides, automatic): (Vec<_>, Vec<_>) =
        matches.iter().partition(|(key, _)| manual.contains_key(key));

    for (key, student_id) in automatic.into_iter().chain(overrides) {
        let value = match key {
            MatchKey::Row(index) => match values.get(index) {
                Some(value) => value.clone(),
                None => continue,
            },
            MatchKey::Photo(handle) => handle.clone(),
        };
        by_student.insert(student_id.to_string(), value);
    }

    by_student
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(pairs: &[(MatchKey, &str)]) -> MatchResult {
        pairs
            .iter()
            .map(|(k, s)| (k.clone(), s.to_string()))
            .collect()
    }

    #[test]
    fn test_merge_overwrites_and_inserts() {
        let auto = result(&[(MatchKey::Row(0), "1"), (MatchKey::Row(1), "2")]);
        let manual = result(&[(MatchKey::Row(1), "3"), (MatchKey::Row(5), "4")]);
        let merged = merge(&auto, &manual);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(&MatchKey::Row(0)), Some("1"));
        assert_eq!(merged.get(&MatchKey::Row(1)), Some("3"));
        assert_eq!(merged.get(&MatchKey::Row(5)), Some("4"));
        // 元の結果は変更しない
        assert_eq!(auto.get(&MatchKey::Row(1)), Some("2"));
    }

    #[test]
    fn test_merge_with_empty_manual_is_identity() {
        let auto = result(&[(MatchKey::Photo("a.jpg".into()), "1")]);
        assert_eq!(merge(&auto, &MatchResult::new()), auto);
    }

    #[test]
    fn test_project_manual_photo_wins() {
        let manual = result(&[(MatchKey::Photo("z_manual.jpg".into()), "1")]);
        let merged = merge(&result(&[(MatchKey::Photo("a_auto.jpg".into()), "1")]), &manual);
        let projected = project(&merged, &BTreeMap::new(), &manual);
        assert_eq!(projected.get("1").map(String::as_str), Some("z_manual.jpg"));

        // キー順に関係なく手動割当が優先
        let manual = result(&[(MatchKey::Photo("a_manual.jpg".into()), "1")]);
        let merged = merge(&result(&[(MatchKey::Photo("z_auto.jpg".into()), "1")]), &manual);
        let projected = project(&merged, &BTreeMap::new(), &manual);
        assert_eq!(projected.get("1").map(String::as_str), Some("a_manual.jpg"));
    }

    #[test]
    fn test_project_rows_use_values() {
        let matches = result(&[(MatchKey::Row(0), "1"), (MatchKey::Row(9), "2")]);
        let values = BTreeMap::from([(0, "Strong swimmer".to_string())]);
        let projected = project(&matches, &values, &MatchResult::new());
        assert_eq!(projected.len(), 1);
        assert_eq!(projected["1"], "Strong swimmer");
    }
}

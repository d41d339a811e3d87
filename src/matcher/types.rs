use super::merge::{merge, project};
use crate::error::RosterMatchError;
use crate::normalizer::GlyphLog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 照合結果のキー（写真ハンドル、または補助表の行番号）
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MatchKey {
    Row(usize),
    Photo(String),
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKey::Row(index) => write!(f, "row:{}", index),
            MatchKey::Photo(handle) => write!(f, "photo:{}", handle),
        }
    }
}

impl FromStr for MatchKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(index) = s.strip_prefix("row:") {
            index
                .trim()
                .parse()
                .map(MatchKey::Row)
                .map_err(|e| format!("行番号が不正: {} ({})", s, e))
        } else if let Some(handle) = s.strip_prefix("photo:") {
            Ok(MatchKey::Photo(handle.to_string()))
        } else {
            Err(format!("Unknown key: {}. Use row:N or photo:HANDLE", s))
        }
    }
}

impl From<MatchKey> for String {
    fn from(key: MatchKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for MatchKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// キー → 生徒ID の対応（1キーにつき生徒IDは1つ）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchResult {
    entries: BTreeMap<MatchKey, String>,
}

impl MatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録（既存の対応は上書きし、以前の生徒IDを返す）
    pub fn insert(&mut self, key: MatchKey, student_id: impl Into<String>) -> Option<String> {
        self.entries.insert(key, student_id.into())
    }

    pub fn get(&self, key: &MatchKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &MatchKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MatchKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// 指定した生徒に対応付いたキー
    pub fn keys_for(&self, student_id: &str) -> Vec<&MatchKey> {
        self.entries
            .iter()
            .filter(|(_, s)| s.as_str() == student_id)
            .map(|(k, _)| k)
            .collect()
    }
}

impl FromIterator<(MatchKey, String)> for MatchResult {
    fn from_iter<I: IntoIterator<Item = (MatchKey, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// 未照合レコードの内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "data")]
pub enum Payload {
    /// 水泳能力・食事制限の値
    Value(String),
    /// 切り出した画像のハンドル
    Image(String),
}

/// 未照合レコードの位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Locator {
    Row(usize),
    Page { page: usize, index: usize },
}

/// 手動割当を待つレコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedRecord {
    /// 元の名前、または画像の下で見つかったテキスト
    pub source_text: String,
    pub payload: Payload,
    pub locator: Locator,
}

impl UnmatchedRecord {
    /// 手動割当で使うキー
    pub fn key(&self) -> MatchKey {
        match (&self.payload, &self.locator) {
            (Payload::Image(handle), _) => MatchKey::Photo(handle.clone()),
            (Payload::Value(_), Locator::Row(index)) => MatchKey::Row(*index),
            (Payload::Value(_), Locator::Page { index, .. }) => MatchKey::Row(*index),
        }
    }
}

/// 1つの入力元（写真・水泳・食事）の照合結果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOutcome {
    pub matches: MatchResult,
    pub unmatched: Vec<UnmatchedRecord>,
    /// 行番号 → 正規化後の値（補助表のみ）
    #[serde(default)]
    pub values: BTreeMap<usize, String>,
    /// 適用済みの手動割当
    #[serde(default)]
    pub manual: MatchResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub glyphs: GlyphLog,
}

impl SourceOutcome {
    /// 列構成エラーなどで中断した入力元
    pub fn failed(err: &RosterMatchError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Default::default()
        }
    }

    /// 手動割当を重ね、割当済みになった未照合レコードを外す
    pub fn apply_manual(&mut self, manual: &MatchResult) {
        self.matches = merge(&self.matches, manual);
        self.manual = merge(&self.manual, manual);
        self.unmatched.retain(|record| !manual.contains_key(&record.key()));
    }

    /// 生徒ID → 値（写真はハンドル）。手動割当が自動照合より優先
    pub fn by_student(&self) -> BTreeMap<String, String> {
        project(&self.matches, &self.values, &self.manual)
    }
}

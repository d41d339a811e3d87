//! 補助表の値の正規化
//!
//! 空欄・"nan"・"submitted" などの扱いは表の種類ごとに異なる。

use regex::Regex;

/// 食事制限表でフォーム提出済みだが記載が無い場合の値
pub const NO_CONCERNS: &str = "No concerns listed";

/// 補助表の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDomain {
    Swimming,
    Dietary,
}

/// 正規化後の値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedValue {
    /// 実際の記載
    Present(String),
    /// 記載なしを表す既定文言（照合対象にはなる）
    Placeholder(&'static str),
    /// 無効な行（照合対象外）
    Absent,
}

impl NormalizedValue {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Present(s) => Some(s.as_str()),
            Self::Placeholder(s) => Some(s),
            Self::Absent => None,
        }
    }

    /// 照合に使えるか
    pub fn is_matchable(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// 未照合として手動割当に回す価値があるか
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl ValueDomain {
    /// レポートJSONでの入力元の名前
    pub fn label(&self) -> &'static str {
        match self {
            Self::Swimming => "swimming",
            Self::Dietary => "dietary",
        }
    }

    /// 生の値を正規化する
    pub fn normalize(&self, raw: &str) -> NormalizedValue {
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();
        let blank = trimmed.is_empty() || lower == "nan" || lower == "submitted";

        match self {
            Self::Swimming if blank => NormalizedValue::Absent,
            Self::Dietary if blank || lower == "n/a" => NormalizedValue::Placeholder(NO_CONCERNS),
            _ => NormalizedValue::Present(trimmed.to_string()),
        }
    }
}

impl std::fmt::Display for ValueDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Swimming => write!(f, "水泳能力"),
            Self::Dietary => write!(f, "食事制限"),
        }
    }
}

/// 水泳能力の区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwimLevel {
    NotRecorded,
    CannotSwim,
    Weak,
    Ok,
}

impl SwimLevel {
    pub fn classify(ability: &str) -> Self {
        lazy_static::lazy_static! {
            static ref NOT_RECORDED_RE: Regex = Regex::new(r"(?i)^\s*(data\s+)?not\s+recorded\s*$").unwrap();
            static ref CANNOT_SWIM_RE: Regex = Regex::new(r"(?i)\bcannot\s+swim\b").unwrap();
            static ref WEAK_RE: Regex = Regex::new(r"(?i)\bweak\s+swimmer\b").unwrap();
        }

        if ability.trim().is_empty() || NOT_RECORDED_RE.is_match(ability) {
            Self::NotRecorded
        } else if CANNOT_SWIM_RE.is_match(ability) {
            Self::CannotSwim
        } else if WEAK_RE.is_match(ability) {
            Self::Weak
        } else {
            Self::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swimming_blank_values_are_absent() {
        for raw in ["", "  ", "nan", "Submitted", "SUBMITTED"] {
            assert_eq!(ValueDomain::Swimming.normalize(raw), NormalizedValue::Absent, "{:?}", raw);
        }
        assert_eq!(
            ValueDomain::Swimming.normalize(" Strong swimmer "),
            NormalizedValue::Present("Strong swimmer".into())
        );
    }

    #[test]
    fn test_dietary_blank_values_become_placeholder() {
        for raw in ["", "nan", "submitted", "N/A", "n/a"] {
            assert_eq!(
                ValueDomain::Dietary.normalize(raw),
                NormalizedValue::Placeholder(NO_CONCERNS),
                "{:?}",
                raw
            );
        }
        let v = ValueDomain::Dietary.normalize("Coeliac");
        assert!(v.is_reportable());
        assert_eq!(v.text(), Some("Coeliac"));
    }

    #[test]
    fn test_swim_level() {
        assert_eq!(SwimLevel::classify(""), SwimLevel::NotRecorded);
        assert_eq!(SwimLevel::classify("Data not recorded"), SwimLevel::NotRecorded);
        assert_eq!(SwimLevel::classify("Cannot swim"), SwimLevel::CannotSwim);
        assert_eq!(SwimLevel::classify("Weak swimmer"), SwimLevel::Weak);
        assert_eq!(SwimLevel::classify("Strong swimmer"), SwimLevel::Ok);
        assert_eq!(SwimLevel::classify("cannot  swim (needs help)"), SwimLevel::CannotSwim);
        assert_eq!(SwimLevel::classify("Weak swimmers group"), SwimLevel::Ok);
    }
}

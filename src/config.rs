use crate::error::{Result, RosterMatchError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 実行設定（列名の対応と空間照合の定数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub roster_columns: RosterColumns,
    pub swimming: AuxTableConfig,
    pub dietary: AuxTableConfig,
    pub spatial: SpatialParams,
}

/// 名簿の列名候補（各項目とも先頭から順に探す）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterColumns {
    pub student_id: Vec<String>,
    pub surname: Vec<String>,
    pub first_name: Vec<String>,
    pub preferred_name: Vec<String>,
    pub roll_group: Vec<String>,
    pub year: Vec<String>,
    pub house: Vec<String>,
}

/// 補助表（水泳・食事）の列構成
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxTableConfig {
    /// 生徒名の列名候補
    pub name_columns: Vec<String>,
    /// 値の列名候補
    pub value_columns: Vec<String>,
    /// 見出し行を置き換える列名（列数補正用）
    pub column_names: Option<Vec<String>>,
    /// 値列の妥当性確認に使うキーワード（空なら確認しない）
    pub value_keywords: Vec<String>,
}

/// 空間照合の定数（単位はページ単位）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialParams {
    /// 姓フレーズとして連結するトークン数の上限
    pub max_phrase_len: usize,
    /// 同一行とみなす `top` の差
    pub same_line_tolerance: f64,
    /// 姓の下を探索する距離
    pub lookahead_fence: f64,
    /// 姓の左右に広げる探索幅
    pub column_pad: f64,
    /// 姓の下端より上にはみ出してよい量
    pub nearby_top_slack: f64,
    /// 写真下端と姓上端の最大距離
    pub max_vertical_gap: f64,
    /// 中心ずれの許容量（フレーズ半幅に加算）
    pub horizontal_margin: f64,
    /// 未割当画像として報告する最小の幅・高さ
    pub orphan_min_size: f64,
    /// 未割当画像の下を探すテキスト範囲
    pub orphan_text_window: f64,
    /// 切り出し解像度（dpi、ページ単位は1/72インチ）
    pub crop_dpi: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roster_columns: RosterColumns::default(),
            swimming: AuxTableConfig::swimming(),
            dietary: AuxTableConfig::dietary(),
            spatial: SpatialParams::default(),
        }
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            student_id: names(&["Student ID", "ID", "Student Code"]),
            surname: names(&["Surname", "Last Name", "Family Name"]),
            first_name: names(&["First name", "First Name", "Given Name"]),
            preferred_name: names(&["Preferred name", "Preferred Name"]),
            roll_group: names(&["Roll group", "Rollgroup", "Roll Group", "Homegroup"]),
            year: names(&["Year", "Year Level"]),
            house: names(&["House"]),
        }
    }
}

impl AuxTableConfig {
    /// 水泳能力表の既定
    pub fn swimming() -> Self {
        Self {
            name_columns: names(&["Student", "Student Name"]),
            value_columns: names(&["Swimming Ability", "Ability"]),
            column_names: None,
            value_keywords: names(&["swimmer", "cannot swim", "competent", "weak", "fair", "strong"]),
        }
    }

    /// 食事制限表の既定
    pub fn dietary() -> Self {
        Self {
            name_columns: names(&["Student", "Student Name"]),
            value_columns: names(&["Dietary Requirements", "Dietary"]),
            column_names: None,
            value_keywords: Vec::new(),
        }
    }
}

impl Default for AuxTableConfig {
    fn default() -> Self {
        Self {
            name_columns: names(&["Student"]),
            value_columns: Vec::new(),
            column_names: None,
            value_keywords: Vec::new(),
        }
    }
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            max_phrase_len: 5,
            same_line_tolerance: 8.0,
            lookahead_fence: 40.0,
            column_pad: 30.0,
            nearby_top_slack: 2.0,
            max_vertical_gap: 35.0,
            horizontal_margin: 40.0,
            orphan_min_size: 30.0,
            orphan_text_window: 50.0,
            crop_dpi: 200.0,
        }
    }
}

impl Config {
    /// 既定パスから読み込み（無ければ既定値）
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスから読み込み（無ければ既定値）
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RosterMatchError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("roster-match").join("config.json"))
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("student_id", &self.roster_columns.student_id),
            ("surname", &self.roster_columns.surname),
            ("first_name", &self.roster_columns.first_name),
        ];
        for (field, aliases) in required {
            if aliases.is_empty() {
                return Err(RosterMatchError::Config(format!(
                    "名簿の列名 '{}' が空です",
                    field
                )));
            }
        }
        if self.spatial.max_phrase_len == 0 {
            return Err(RosterMatchError::Config("max_phrase_len は1以上".into()));
        }
        Ok(())
    }
}

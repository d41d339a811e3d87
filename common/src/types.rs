//! 名簿・写真ドキュメント・補助表の型定義

use crate::error::Result;
use crate::geometry::BBox;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 名簿の1生徒分
///
/// 照合の実行中は変更しない。表示用に元の大文字小文字を保持する。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: String,
    pub surname: String,
    pub first_name: String,
    #[serde(default)]
    pub preferred_name: Option<String>,
    #[serde(default)]
    pub roll_group: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub house: String,
}

impl RosterEntry {
    /// 「Surname, First (ID)」形式の表示名
    pub fn display_name(&self) -> String {
        format!("{}, {} ({})", self.surname, self.first_name, self.student_id)
    }

    /// 空白のみの通称は無いものとして扱う
    pub fn preferred(&self) -> Option<&str> {
        self.preferred_name
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// ページ上の位置付きテキスト
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionedToken {
    pub text: String,
    pub top: f64,
    pub bottom: f64,
    pub x0: f64,
    pub x1: f64,
    #[serde(default)]
    pub page_index: usize,
}

impl PositionedToken {
    pub fn bbox(&self) -> BBox {
        BBox::new(self.x0, self.top, self.x1, self.bottom)
    }
}

/// ページ上の位置付き画像
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionedImage {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
    #[serde(default)]
    pub page_index: usize,
    /// 抽出済みの画像ファイル（あればページラスタより優先）
    #[serde(default)]
    pub source: Option<PathBuf>,
}

impl PositionedImage {
    pub fn bbox(&self) -> BBox {
        BBox::new(self.x0, self.top, self.x1, self.bottom)
    }
}

/// 写真ドキュメントの1ページ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhotoPage {
    #[serde(default)]
    pub index: usize,
    /// ページ幅（ページ単位）
    #[serde(default)]
    pub width: f64,
    /// ページ高さ（ページ単位）
    #[serde(default)]
    pub height: f64,
    /// ページ全体のラスタ画像
    #[serde(default)]
    pub raster: Option<PathBuf>,
    #[serde(default)]
    pub tokens: Vec<PositionedToken>,
    #[serde(default)]
    pub images: Vec<PositionedImage>,
}

/// 写真ドキュメント（上流のレイアウト抽出結果）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhotoDocument {
    pub pages: Vec<PhotoPage>,
}

impl PhotoDocument {
    /// JSON文字列から読み込み
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut doc: Self = serde_json::from_str(json)?;
        doc.reindex();
        Ok(doc)
    }

    /// JSONファイルから読み込み
    ///
    /// 相対パスのラスタ・画像ファイルはJSONの親ディレクトリ基準で解決する。
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut doc = Self::from_json_str(&content)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        doc.resolve_paths(base_dir);
        Ok(doc)
    }

    /// ページ番号をページ順に振り直す
    fn reindex(&mut self) {
        for (index, page) in self.pages.iter_mut().enumerate() {
            page.index = index;
            for token in &mut page.tokens {
                token.page_index = index;
            }
            for image in &mut page.images {
                image.page_index = index;
            }
        }
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut Option<PathBuf>| {
            if let Some(path) = p {
                if path.is_relative() {
                    *path = base_dir.join(&*path);
                }
            }
        };

        for page in &mut self.pages {
            resolve(&mut page.raster);
            for image in &mut page.images {
                resolve(&mut image.source);
            }
        }
    }

    pub fn token_count(&self) -> usize {
        self.pages.iter().map(|p| p.tokens.len()).sum()
    }

    pub fn image_count(&self) -> usize {
        self.pages.iter().map(|p| p.images.len()).sum()
    }
}

/// 補助表（水泳能力・食事制限）の1行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxRow {
    /// 自由記述の生徒名
    pub name: String,
    /// 自由記述の値
    pub value: String,
}

impl AuxRow {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

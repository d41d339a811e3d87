//! 写真の保存先
//!
//! 照合で採用した画像・未割当画像を保存し、ハンドル（保存先パス等）を返す。

mod crop;

pub use crop::CropSink;

use crate::error::Result;
use roster_match_common::{PhotoPage, PositionedImage};

/// 保存する画像の名前
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CropName {
    /// 生徒に割り当てた写真
    Student(String),
    /// 割当先の無い画像（ページ番号は0始まり）
    Orphan { page: usize, index: usize },
}

impl CropName {
    /// ファイル名（拡張子なし）
    pub fn file_stem(&self) -> String {
        match self {
            CropName::Student(id) => sanitize(id),
            CropName::Orphan { page, index } => format!("unmatched_p{}_{}", page + 1, index),
        }
    }
}

/// ファイル名に使えない文字を `_` に置換
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// 画像の保存先
pub trait ImageSink {
    /// 画像を保存してハンドルを返す
    ///
    /// # Arguments
    /// * `page` - 画像のあるページ
    /// * `index` - ページ内の画像番号
    /// * `image` - 画像の位置
    /// * `name` - 保存名
    fn persist(
        &mut self,
        page: &PhotoPage,
        index: usize,
        image: &PositionedImage,
        name: &CropName,
    ) -> Result<String>;
}

/// 画素を保存せず、位置だけのハンドルを返す
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleSink;

impl ImageSink for HandleSink {
    fn persist(
        &mut self,
        page: &PhotoPage,
        index: usize,
        _image: &PositionedImage,
        _name: &CropName,
    ) -> Result<String> {
        Ok(format!("p{}_img{}", page.index + 1, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem() {
        assert_eq!(CropName::Student("12345".into()).file_stem(), "12345");
        assert_eq!(CropName::Student("a/b c".into()).file_stem(), "a_b_c");
        assert_eq!(CropName::Orphan { page: 0, index: 3 }.file_stem(), "unmatched_p1_3");
    }

    #[test]
    fn test_handle_sink() {
        let page = PhotoPage {
            index: 2,
            ..Default::default()
        };
        let handle = HandleSink
            .persist(&page, 4, &PositionedImage::default(), &CropName::Student("1".into()))
            .unwrap();
        assert_eq!(handle, "p3_img4");
    }
}

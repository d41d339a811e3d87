use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterMatchError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("列が見つかりません: {field}（存在する列: {available}）")]
    MissingColumn { field: String, available: String },

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("名簿の読み込みに失敗: {0}")]
    RosterLoad(String),

    #[error("写真ドキュメントが不正: {0}")]
    Document(String),

    #[error("画像切り出しエラー: {0}")]
    ImageCrop(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl RosterMatchError {
    /// 列構成の誤り（その入力元だけを中断する種類のエラー）か
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::MissingColumn { .. })
    }
}

impl From<roster_match_common::Error> for RosterMatchError {
    fn from(err: roster_match_common::Error) -> Self {
        use roster_match_common::Error as Common;
        match err {
            Common::Io(e) => Self::Io(e),
            Common::Json(e) => Self::JsonParse(e),
            Common::Config(msg) => Self::Config(msg),
            Common::MissingColumn { field, available } => Self::MissingColumn { field, available },
        }
    }
}

impl From<image::ImageError> for RosterMatchError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageCrop(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RosterMatchError>;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roster-match")]
#[command(about = "名簿と写真台帳・水泳能力表・食事制限表の照合ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力（照合ごとの判定理由）
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 設定ファイル（デフォルト: ~/.config/roster-match/config.json）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 名簿と各入力を照合してレポートJSONを出力
    Run {
        /// 名簿ファイル（CSV / Excel）
        #[arg(required = true)]
        roster: PathBuf,

        /// 写真台帳（位置付きトークン・画像のJSON）
        #[arg(short, long)]
        photos: Option<PathBuf>,

        /// 水泳能力表CSV
        #[arg(short, long)]
        swimming: Option<PathBuf>,

        /// 食事制限表CSV
        #[arg(short, long)]
        dietary: Option<PathBuf>,

        /// 出力JSONファイル
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// 切り出した写真の保存先（省略時は画像を保存しない）
        #[arg(long)]
        crop_dir: Option<PathBuf>,
    },

    /// レポートに手動割当を重ねる
    Merge {
        /// レポートJSON
        #[arg(required = true)]
        report: PathBuf,

        /// 手動割当JSON（{"photos": {"photo:HANDLE": "ID"}, "swimming": {"row:N": "ID"}, ...}）
        #[arg(required = true)]
        manual: PathBuf,

        /// 出力JSONファイル（デフォルト: 入力レポートを上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 生徒ごとの集約を表示
        #[arg(long)]
        students: bool,
    },

    /// 写真台帳から断片を含むトークンとコードポイントを表示
    Glyphs {
        /// 写真台帳JSON
        #[arg(required = true)]
        document: PathBuf,

        /// 探す文字列（例: "ffi"）
        #[arg(required = true)]
        fragment: String,
    },

    /// 文字列の正規化結果を表示
    Normalize {
        /// 正規化する文字列
        #[arg(required = true)]
        text: String,
    },

    /// 設定を表示・初期化
    Config {
        /// 現在の設定を表示
        #[arg(long)]
        show: bool,

        /// デフォルト設定ファイルを作成
        #[arg(long)]
        init: bool,
    },
}

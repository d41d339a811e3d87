//! 名簿との照合
//!
//! - `spatial`: 写真台帳のページ上で姓と写真を位置関係から対応付ける
//! - `fuzzy`: 水泳能力・食事制限の表を生徒名で名簿に対応付ける
//! - `merge`: 手動割当の重ね合わせと生徒ID単位への変換

mod fuzzy;
mod merge;
mod spatial;
mod surname;
mod types;

pub use fuzzy::{read_aux_table, table_rows, NameMatch, RosterMatcher};
pub use merge::{merge, project};
pub use spatial::{Disambiguation, PageOutcome, SpatialMatcher, StudentCandidate, StudentMap, NO_TEXT_BELOW};
pub use surname::SurnameIndex;
pub use types::{Locator, MatchKey, MatchResult, Payload, SourceOutcome, UnmatchedRecord};

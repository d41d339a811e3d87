//! Roster Match Common Library
//!
//! 名簿・写真ドキュメント・補助表の共有型と表読み込み

pub mod error;
pub mod geometry;
pub mod table;
pub mod types;

pub use error::{Error, Result};
pub use geometry::BBox;
pub use table::Table;
pub use types::{AuxRow, PhotoDocument, PhotoPage, PositionedImage, PositionedToken, RosterEntry};

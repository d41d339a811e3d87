//! roster-match: 名簿と写真台帳・補助表の照合

pub mod cli;
pub mod config;
pub mod error;
pub mod matcher;
pub mod normalizer;
pub mod photo;
pub mod pipeline;
pub mod roster;

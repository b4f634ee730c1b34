pub mod sector_dto;

pub use sector_dto::*;

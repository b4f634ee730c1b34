pub mod sector_service;

pub use sector_service::SectorService;

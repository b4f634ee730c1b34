pub mod sector_handler;

pub use sector_handler::{
    __path_create_sector, __path_delete_sector, __path_list_public_sectors, __path_list_sectors,
    __path_update_sector, create_sector, delete_sector, list_public_sectors, list_sectors,
    update_sector,
};

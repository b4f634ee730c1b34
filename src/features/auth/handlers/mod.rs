pub mod auth_handler;

pub use auth_handler::{
    __path_get_me, __path_login, __path_logout, __path_register, __path_update_me, get_me, login,
    logout, register, update_me,
};

//! Account administration for admins.
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/users` | Paginated list, filter by role and search |
//! | PUT | `/api/users/{id}` | Change role, name or email |

pub mod dtos;
pub mod handlers;
pub mod routes;
pub mod services;

pub use services::UserAdminService;

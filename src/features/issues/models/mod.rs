pub mod issue;
pub mod issue_image;

pub use issue::*;
pub use issue_image::*;

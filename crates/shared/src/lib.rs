pub mod api;
pub mod documents;

pub use api::*;
pub use documents::*;

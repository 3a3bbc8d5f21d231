//! Request handlers.

pub mod download;
pub mod health;
pub mod preview;
pub mod result;
pub mod upload;

pub use download::download;
pub use health::*;
pub use preview::preview;
pub use result::result;
pub use upload::{index, upload};

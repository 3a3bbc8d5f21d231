//! Background services.

mod retention;

pub use retention::RetentionSweeper;

pub mod batch;
pub mod event;
pub mod photo;
pub mod tag;

pub use batch::{BatchReport, ItemOutcome};
pub use event::EventId;
pub use photo::{Photo, PhotoStatus};
pub use tag::Tag;

pub mod slots;
pub mod repository;

pub use slots::{SlotGenerator, SlotRejection};
pub use repository::{InMemoryScheduleRepository, ScheduleRepository};

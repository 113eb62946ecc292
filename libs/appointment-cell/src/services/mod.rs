pub mod lifecycle;
pub mod ledger;
pub mod scheduler;

pub use lifecycle::AppointmentLifecycleService;
pub use ledger::{BookingLedger, InMemoryBookingLedger};
pub use scheduler::AppointmentScheduler;

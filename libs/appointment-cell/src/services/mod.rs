pub mod booking;
pub mod lifecycle;
pub mod projection;
pub mod store;

pub use booking::{clinic_offset, BookingService};
pub use lifecycle::LifecycleService;
pub use projection::ProjectionService;
pub use store::{AppointmentStore, InMemoryAppointmentStore, StoreError, SupabaseAppointmentStore};

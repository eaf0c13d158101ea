pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::{DaySlot, DirectoryError, Doctor};
pub use router::{doctor_routes, DoctorState};
pub use services::{DoctorDirectory, SlotAllocator, StaticDoctorDirectory, SupabaseDoctorDirectory};

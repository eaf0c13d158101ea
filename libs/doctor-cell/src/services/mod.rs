pub mod directory;
pub mod slots;

pub use directory::{DoctorDirectory, StaticDoctorDirectory, SupabaseDoctorDirectory};
pub use slots::SlotAllocator;

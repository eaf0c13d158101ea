pub mod registry;

pub use registry::{InMemoryPatientRegistry, PatientRegistry, SupabasePatientRegistry};

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Appointment, AppointmentError, AppointmentStatus, DoctorView, PatientView};
pub use router::{appointment_routes, AppointmentState};

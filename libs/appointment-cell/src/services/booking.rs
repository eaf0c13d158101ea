use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::services::slots::{format_slot_time, parse_slot_time};
use doctor_cell::services::{DoctorDirectory, SlotAllocator};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, ValidationReason,
    APPOINTMENT_DURATION_MINUTES,
};
use crate::services::store::AppointmentStore;

/// Clinic wall-clock offset; out-of-range values fall back to UTC.
pub fn clinic_offset(offset_minutes: i32) -> FixedOffset {
    offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| {
            warn!("Clinic UTC offset of {} minutes is out of range, using UTC", offset_minutes);
            Utc.fix()
        })
}

pub struct BookingService {
    directory: Arc<dyn DoctorDirectory>,
    store: Arc<dyn AppointmentStore>,
    clinic_offset: FixedOffset,
}

impl BookingService {
    pub fn new(
        directory: Arc<dyn DoctorDirectory>,
        store: Arc<dyn AppointmentStore>,
        clinic_offset: FixedOffset,
    ) -> Self {
        Self {
            directory,
            store,
            clinic_offset,
        }
    }

    /// Reserves an offered slot for `patient_id`.
    ///
    /// Input is validated first, then the doctor and the offer, and finally the store's
    /// insert-if-absent decides between two bookings racing for the same slot.
    pub async fn book(
        &self,
        patient_id: &str,
        request: BookAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment_type = request.appointment_type.trim();
        if appointment_type.is_empty() {
            return Err(AppointmentError::validation(
                ValidationReason::MissingType,
                "Appointment type is required",
            ));
        }

        let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d").map_err(|_| {
            AppointmentError::validation(
                ValidationReason::MalformedDate,
                format!("'{}' is not a YYYY-MM-DD date", request.date),
            )
        })?;

        let time = parse_slot_time(&request.time).ok_or_else(|| {
            AppointmentError::validation(
                ValidationReason::MalformedTime,
                format!("'{}' is not a valid time", request.time),
            )
        })?;

        let doctor = self
            .directory
            .get_doctor(&request.doctor_id)
            .await
            .map_err(|e| AppointmentError::ExternalService(e.to_string()))?
            .ok_or_else(|| {
                AppointmentError::validation(
                    ValidationReason::UnknownDoctor,
                    format!("Doctor {} does not exist", request.doctor_id),
                )
            })?;

        if !SlotAllocator::is_offered(&doctor, date, time) {
            debug!("Doctor {} does not offer {} {}", doctor.id, date, time);
            return Err(AppointmentError::validation(
                ValidationReason::SlotUnavailable,
                format!(
                    "{} on {} is not available with {}",
                    format_slot_time(time),
                    date,
                    doctor.name
                ),
            ));
        }

        let start_time = self.start_of(date, time)?;
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: doctor.id.clone(),
            doctor_name: doctor.name.clone(),
            video_link: doctor.video_link.clone(),
            patient_id: patient_id.to_string(),
            appointment_type: appointment_type.to_string(),
            date,
            time,
            start_time,
            end_time: start_time + Duration::minutes(APPOINTMENT_DURATION_MINUTES),
            status: AppointmentStatus::Upcoming,
            notes: None,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };

        let booked = self.store.insert_if_absent(appointment).await?;

        info!(
            "Booked appointment {} with doctor {} on {} at {}",
            booked.id, booked.doctor_id, booked.date, booked.time
        );
        Ok(booked)
    }

    fn start_of(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<DateTime<Utc>, AppointmentError> {
        self.clinic_offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|start| start.with_timezone(&Utc))
            .ok_or_else(|| {
                AppointmentError::validation(
                    ValidationReason::MalformedTime,
                    format!("{} {} cannot be placed on the clinic clock", date, time),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinic_offset_in_minutes() {
        assert_eq!(clinic_offset(0).local_minus_utc(), 0);
        assert_eq!(clinic_offset(330).local_minus_utc(), 330 * 60);
        assert_eq!(clinic_offset(-300).local_minus_utc(), -300 * 60);
        assert_eq!(clinic_offset(24 * 60).local_minus_utc(), 0);
    }
}

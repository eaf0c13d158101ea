use chrono::{NaiveDate, NaiveTime};
use tracing::warn;

use crate::models::Doctor;

const SLOT_TIME_FORMATS: [&str; 3] = ["%I:%M %p", "%H:%M", "%H:%M:%S"];

/// Parses an offered time such as `10:00 AM`, `2:00 pm` or `14:00`.
pub fn parse_slot_time(raw: &str) -> Option<NaiveTime> {
    let normalized = raw.trim().to_ascii_uppercase();
    SLOT_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&normalized, format).ok())
}

/// Renders a time the way the directory declares it, e.g. `2:00 PM`.
pub fn format_slot_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Computes bookable offers from a doctor's declared day slots.
///
/// Stateless: booked times are not removed here, the booking conflict check decides.
pub struct SlotAllocator;

impl SlotAllocator {
    /// Offered start times for `date`, in declared order without duplicates.
    ///
    /// Unknown dates and unavailable slots both yield an empty list.
    pub fn offers_for(doctor: &Doctor, date: NaiveDate) -> Vec<NaiveTime> {
        let mut offers = Vec::new();

        for slot in doctor.day_slots.iter().filter(|s| s.date == date && s.available) {
            for raw in &slot.times {
                match parse_slot_time(raw) {
                    Some(time) if !offers.contains(&time) => offers.push(time),
                    Some(_) => {}
                    None => warn!("Skipping unparsable time '{}' for doctor {}", raw, doctor.id),
                }
            }
        }

        offers
    }

    pub fn is_offered(doctor: &Doctor, date: NaiveDate, time: NaiveTime) -> bool {
        Self::offers_for(doctor, date).contains(&time)
    }
}

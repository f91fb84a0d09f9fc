use crate::models::{ClockTime, Slot, TimeRange};

/// Cut each working range into consecutive slots of `slot_duration` minutes,
/// leaving `buffer_time` minutes between neighbours. A slot never runs past
/// the end of its range, so ranges shorter than one slot yield nothing.
pub fn generate_slots(ranges: &[TimeRange], slot_duration: u32, buffer_time: u32) -> Vec<Slot> {
    if slot_duration == 0 {
        return Vec::new();
    }

    let step = slot_duration + buffer_time;
    let mut slots = Vec::new();

    for range in ranges {
        let end = range.end_time.minutes();
        let mut cursor = range.start_time.minutes();

        while cursor + slot_duration <= end {
            // both ends lie inside the range, which lies inside one day
            if let (Some(start_time), Some(end_time)) =
                (ClockTime::from_minutes(cursor), ClockTime::from_minutes(cursor + slot_duration))
            {
                slots.push(Slot { start_time, end_time });
            }
            cursor += step;
        }
    }

    slots.sort_by_key(|slot| slot.start_time);
    slots
}

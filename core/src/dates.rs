//! Calendar-day expansion for a stop's arrival/departure pair.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("departure date {departure} precedes arrival date {arrival}")]
pub struct InvalidRange {
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
}

/// Ordered, inclusive list of days from `arrival` to `departure`.
///
/// A missing departure means a one-day stop.
pub fn day_sequence(
    arrival: NaiveDate,
    departure: Option<NaiveDate>,
) -> Result<Vec<NaiveDate>, InvalidRange> {
    let departure = departure.unwrap_or(arrival);
    if departure < arrival {
        return Err(InvalidRange { arrival, departure });
    }
    Ok(arrival.iter_days().take_while(|day| *day <= departure).collect())
}

/// Number of days covered by an inclusive range.
pub fn span_days(arrival: NaiveDate, departure: NaiveDate) -> Result<usize, InvalidRange> {
    if departure < arrival {
        return Err(InvalidRange { arrival, departure });
    }
    Ok((departure - arrival).num_days() as usize + 1)
}

//! Event materialization.
//!
//! Turns stored records (weekly templates and one-off events) into the flat,
//! dated, chronologically ordered list the site displays. Nothing produced
//! here is persisted; template occurrences are regenerated relative to the
//! reference date on every read.

use chrono::NaiveDate;

use crate::error::CongregationResult;
use crate::event::{EventDetails, EventInstance, EventRecord, EventType, Recurrence};
use crate::occurrence::next_occurrences;

/// Expand, merge and sort stored event records.
///
/// Each weekly template yields `fan_out` instances identified as
/// `{key}-{index}`; every other record yields one instance identified by its
/// storage key. The result is stable-sorted ascending by date.
pub fn materialize<I>(
    records: I,
    today: NaiveDate,
    fan_out: usize,
) -> CongregationResult<Vec<EventInstance>>
where
    I: IntoIterator<Item = (String, EventRecord)>,
{
    let mut instances = Vec::new();

    for (key, record) in records {
        match record {
            EventRecord::Recurring {
                details,
                recurrence,
            } => {
                let dates = next_occurrences(i64::from(recurrence.day_of_week), fan_out, today)?;
                for (index, date) in dates.into_iter().enumerate() {
                    instances.push(occurrence_instance(&key, index, &details, recurrence, date));
                }
            }
            EventRecord::OneOff { details, date } => {
                instances.push(single_instance(key, details, Some(date)));
            }
            EventRecord::Undated { details } => {
                instances.push(single_instance(key, details, None));
            }
        }
    }

    sort_by_date(&mut instances);
    Ok(instances)
}

/// Stable sort ascending by date.
///
/// Undated instances compare equal to each other and sort ahead of dated ones,
/// keeping their relative input order.
pub fn sort_by_date(instances: &mut [EventInstance]) {
    instances.sort_by_key(|instance| instance.date);
}

fn occurrence_instance(
    key: &str,
    index: usize,
    details: &EventDetails,
    recurrence: Recurrence,
    date: NaiveDate,
) -> EventInstance {
    EventInstance {
        id: format!("{key}-{index}"),
        source_key: key.to_string(),
        title: details.title.clone(),
        time: details.time.clone(),
        date: Some(date),
        description: details.description.clone(),
        image_url: details.image_url.clone(),
        kind: EventType::Regular,
        recurrence: Some(recurrence),
        is_permanent: details.is_permanent,
    }
}

fn single_instance(key: String, details: EventDetails, date: Option<NaiveDate>) -> EventInstance {
    EventInstance {
        source_key: key.clone(),
        id: key,
        title: details.title,
        time: details.time,
        date,
        description: details.description,
        image_url: details.image_url,
        kind: details.kind.unwrap_or(EventType::Special),
        recurrence: None,
        is_permanent: details.is_permanent,
    }
}

//! Timetable indexes and departure computation.
//!
//! Only the stop times of the resolved stops are kept; everything else in
//! `stop_times.txt` is dropped while reading.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Days scanned forward from today, today included.
pub const SCAN_DAYS: i64 = 7;

/// Departures already this far in the past are still shown as "0 min".
pub const PAST_TOLERANCE_SECS: i64 = 60;

const DAY_SECS: i64 = 86_400;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Route {
    pub route_id: String,
    pub route_short_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    pub trip_headsign: String,
}

/// A `calendar.txt` row. Dates are `YYYYMMDD` strings; empty means open.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Calendar {
    pub service_id: String,
    pub monday: String,
    pub tuesday: String,
    pub wednesday: String,
    pub thursday: String,
    pub friday: String,
    pub saturday: String,
    pub sunday: String,
    pub start_date: String,
    pub end_date: String,
}

impl Calendar {
    fn runs_on(&self, date: NaiveDate) -> bool {
        let flag = match date.weekday().num_days_from_monday() {
            0 => &self.monday,
            1 => &self.tuesday,
            2 => &self.wednesday,
            3 => &self.thursday,
            4 => &self.friday,
            5 => &self.saturday,
            _ => &self.sunday,
        };
        flag == "1"
    }
}

/// A `calendar_dates.txt` row: `1` adds service on `date`, `2` removes it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CalendarException {
    pub service_id: String,
    pub date: String,
    pub exception_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StopTime {
    pub trip_id: String,
    pub arrival_time: String,
    pub stop_id: String,
}

/// One row of the departure board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub route: String,
    pub headsign: String,
    pub minutes: i64,
    pub arrival_time: String,
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Seconds since midnight for `H:MM[:SS]`. Hours may exceed 23.
pub fn parse_time_of_day(value: &str) -> Option<i64> {
    let mut parts = value.split(':');
    let hours: i64 = parts.next()?.trim().parse().ok()?;
    let minutes: i64 = parts.next()?.trim().parse().unwrap_or(0);
    let seconds: i64 = parts.next().and_then(|s| s.trim().parse().ok()).unwrap_or(0);
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

/// Whether a service runs on `date`.
///
/// An exception on that exact date decides on its own. Without one, the
/// service needs a calendar row whose date range covers `date` and whose
/// weekday flag is set.
pub fn is_service_active(
    calendar: Option<&Calendar>,
    exceptions: &[CalendarException],
    date: NaiveDate,
) -> bool {
    let day = ymd(date);
    if let Some(ex) = exceptions.iter().find(|ex| ex.date == day) {
        return ex.exception_type == "1";
    }
    let Some(calendar) = calendar else {
        return false;
    };
    if !calendar.start_date.is_empty() && day < calendar.start_date {
        return false;
    }
    if !calendar.end_date.is_empty() && day > calendar.end_date {
        return false;
    }
    calendar.runs_on(date)
}

/// The slice of a feed needed to answer departure queries.
#[derive(Debug, Default)]
pub struct Schedule {
    routes: HashMap<String, Route>,
    trips: HashMap<String, Trip>,
    calendars: HashMap<String, Calendar>,
    exceptions: HashMap<String, Vec<CalendarException>>,
    stop_times: HashMap<String, Vec<StopTime>>,
}

impl Schedule {
    pub fn new(
        routes: Vec<Route>,
        trips: Vec<Trip>,
        calendars: Vec<Calendar>,
        exceptions: Vec<CalendarException>,
        stop_times: Vec<StopTime>,
    ) -> Self {
        let mut by_service: HashMap<String, Vec<CalendarException>> = HashMap::new();
        for ex in exceptions {
            by_service.entry(ex.service_id.clone()).or_default().push(ex);
        }
        let mut by_stop: HashMap<String, Vec<StopTime>> = HashMap::new();
        for st in stop_times {
            by_stop.entry(st.stop_id.clone()).or_default().push(st);
        }

        Self {
            routes: routes.into_iter().map(|r| (r.route_id.clone(), r)).collect(),
            trips: trips.into_iter().map(|t| (t.trip_id.clone(), t)).collect(),
            calendars: calendars
                .into_iter()
                .map(|c| (c.service_id.clone(), c))
                .collect(),
            exceptions: by_service,
            stop_times: by_stop,
        }
    }

    pub fn stop_time_count(&self, stop_id: &str) -> usize {
        self.stop_times.get(stop_id).map_or(0, Vec::len)
    }

    fn service_active(&self, service_id: &str, date: NaiveDate) -> bool {
        is_service_active(
            self.calendars.get(service_id),
            self.exceptions
                .get(service_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            date,
        )
    }

    fn route_label(&self, trip: &Trip) -> String {
        match self.routes.get(&trip.route_id) {
            Some(route) if !route.route_short_name.is_empty() => route.route_short_name.clone(),
            Some(route) => route.route_id.clone(),
            None => trip.route_id.clone(),
        }
    }

    /// The next `limit` departures from `stop_id` as seen at local time `now`.
    ///
    /// Days are scanned forward from today until enough candidates have been
    /// collected; results are ordered by minutes, then by arrival time text.
    pub fn departures(&self, stop_id: &str, now: NaiveDateTime, limit: usize) -> Vec<Departure> {
        let Some(times) = self.stop_times.get(stop_id) else {
            return Vec::new();
        };
        let now_secs = now.num_seconds_from_midnight() as i64;
        let today = now.date();

        let mut out = Vec::new();
        for day_offset in 0..SCAN_DAYS {
            if out.len() >= limit.saturating_mul(5) {
                break;
            }
            let date = today + chrono::Duration::days(day_offset);
            for st in times {
                let Some(trip) = self.trips.get(&st.trip_id) else {
                    continue;
                };
                if !self.service_active(&trip.service_id, date) {
                    continue;
                }
                let Some(arrival) = parse_time_of_day(&st.arrival_time) else {
                    continue;
                };
                let diff = (day_offset * DAY_SECS)
                    .saturating_add(arrival)
                    .saturating_sub(now_secs);
                if diff < -PAST_TOLERANCE_SECS {
                    continue;
                }
                out.push(Departure {
                    route: self.route_label(trip),
                    headsign: trip.trip_headsign.clone(),
                    minutes: diff.div_euclid(60).max(0),
                    arrival_time: st.arrival_time.clone(),
                });
            }
        }

        out.sort_by(|a, b| {
            a.minutes
                .cmp(&b.minutes)
                .then_with(|| a.arrival_time.cmp(&b.arrival_time))
        });
        out.truncate(limit);
        out
    }
}

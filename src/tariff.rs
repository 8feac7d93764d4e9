//! # Tariff Profile Engine
//!
//! Turns the raw NEVA MT3xx profile registers into billing-ready energy
//! buckets. Per requested day the engine pulls the cumulative tariff totals
//! and the 48-slot half-hour load profile, assigns every half hour to a
//! tariff bucket according to the meter's year and day schedules, and
//! accumulates the energies into running totals.
//!
//! The day boundary is defined by the meter's clock, not the caller's, so the
//! meter date is read before and after each day's registers. If it changed
//! mid-query (the meter rolled past midnight), the partial accumulation is
//! discarded and the read retried against the corrected day offset.
//!
//! Register access goes through the [`RegisterReader`] seam; any
//! authenticated client [`Session`](crate::iec::session::Session) implements
//! it, and tests drive the engine with scripted readers.

use crate::constants::{
    DATE_ROLLOVER_RETRIES, DAY_SCHEDULE_SLOTS, HALF_HOURS_PER_DAY, MAX_MONTHS_AGO,
    MAX_PROFILE_DAYS_AGO, MAX_TARIFF_INDEX, OBIS_DATE, OBIS_DAY_ENERGIES_PREFIX,
    OBIS_DAY_SCHEDULE, OBIS_HALF_HOURS_PREFIX, OBIS_MONTH_ENERGIES_PREFIX, OBIS_YEAR_SCHEDULE,
    TARIFF_ORDINARY_DAY, YEAR_SCHEDULE_SLOTS,
};
use crate::error::Iec61107Error;
use crate::iec::session::{Session, Transport};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;

/// Read access to meter registers addressed by OBIS codes.
pub trait RegisterReader {
    fn read_register(&mut self, code: &str) -> Result<String, Iec61107Error>;
}

impl<T: Transport> RegisterReader for Session<T> {
    fn read_register(&mut self, code: &str) -> Result<String, Iec61107Error> {
        Session::read_register(self, code)
    }
}

/// One half hour of one day: the raw delta, its tariff bucket and a snapshot
/// of the five running totals (`sum, T1..T4`, watt-hours) after adding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalfHourRecord {
    pub timestamp: NaiveDateTime,
    pub tariff: u8,
    pub energy_w: i64,
    pub totals: [i64; 5],
}

/// Year and day tariff schedules, loaded once per query run.
#[derive(Debug, Clone)]
pub struct TariffProfile {
    year_schedule: Vec<String>,
    day_tariffs: [u8; HALF_HOURS_PER_DAY],
}

fn malformed(obis: &str, payload: &str) -> Iec61107Error {
    Iec61107Error::MalformedRegister {
        obis: obis.to_string(),
        payload: payload.to_string(),
    }
}

/// Reads the meter's current date, `YYMMDD`.
pub fn read_meter_date<R: RegisterReader>(reader: &mut R) -> Result<NaiveDate, Iec61107Error> {
    let value = reader.read_register(OBIS_DATE)?;
    NaiveDate::parse_from_str(&value, "%y%m%d").map_err(|_| malformed(OBIS_DATE, &value))
}

/// Reads the 48 half-hour active-energy deltas (W) of the day `days_ago`
/// days back.
pub fn read_half_hours<R: RegisterReader>(
    reader: &mut R,
    days_ago: u8,
) -> Result<Vec<i64>, Iec61107Error> {
    if days_ago > MAX_PROFILE_DAYS_AGO {
        return Err(Iec61107Error::DaysAgoOutOfRange(i64::from(days_ago)));
    }
    let obis = format!("{OBIS_HALF_HOURS_PREFIX}{days_ago:02X}");
    let value = reader.read_register(&obis)?;
    let deltas = value
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed(&obis, &value))?;
    if deltas.len() != HALF_HOURS_PER_DAY {
        return Err(malformed(&obis, &value));
    }
    Ok(deltas)
}

/// Parses a five-value `sum,T1..T4` energies register, kWh in, Wh out.
fn parse_energies(obis: &str, value: &str) -> Result<[i64; 5], Iec61107Error> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed(obis, value))?;
    let parts: [f64; 5] = parts.try_into().map_err(|_| malformed(obis, value))?;
    Ok(parts.map(|kwh| (kwh * 1000.0) as i64))
}

/// Reads the cumulative per-tariff energies of the day `days_ago` days back.
pub fn read_day_energies<R: RegisterReader>(
    reader: &mut R,
    days_ago: u8,
) -> Result<[i64; 5], Iec61107Error> {
    if days_ago > MAX_PROFILE_DAYS_AGO {
        return Err(Iec61107Error::DaysAgoOutOfRange(i64::from(days_ago)));
    }
    let obis = format!("{OBIS_DAY_ENERGIES_PREFIX}{days_ago:02X}");
    let value = reader.read_register(&obis)?;
    parse_energies(&obis, &value)
}

/// Reads the cumulative per-tariff energies of the month `months_ago` months
/// back.
pub fn read_month_energies<R: RegisterReader>(
    reader: &mut R,
    months_ago: u8,
) -> Result<[i64; 5], Iec61107Error> {
    if months_ago > MAX_MONTHS_AGO {
        return Err(Iec61107Error::MonthsAgoOutOfRange(months_ago));
    }
    let obis = format!("{OBIS_MONTH_ENERGIES_PREFIX}{months_ago:02X}");
    let value = reader.read_register(&obis)?;
    parse_energies(&obis, &value)
}

/// Reads a schedule register: fixed slot count, zero (unused) tokens dropped,
/// the rest date-ordered. Each kept token is 6 characters with a hex tariff
/// suffix.
fn read_schedule<R: RegisterReader>(
    reader: &mut R,
    obis: &str,
    slots: usize,
) -> Result<Vec<String>, Iec61107Error> {
    let value = reader.read_register(obis)?;
    let tokens: Vec<&str> = value.split(',').map(str::trim).collect();
    if tokens.len() != slots {
        return Err(malformed(obis, &value));
    }
    let mut kept = Vec::new();
    for token in tokens {
        if token.bytes().all(|b| b == b'0') {
            continue;
        }
        if token.len() != 6 || u8::from_str_radix(&token[4..6], 16).is_err() {
            return Err(malformed(obis, &value));
        }
        kept.push(token.to_string());
    }
    // fixed-width digit strings, lexicographic order is chronological order
    kept.sort();
    Ok(kept)
}

/// Expands the day schedule into one tariff index per half-hour slot.
///
/// Each slot gets the tariff of the latest schedule entry whose start time is
/// not after the slot's start time; slots before the first entry wrap around
/// to the last one. An empty schedule defaults everything to tariff 1.
fn day_slot_tariffs(schedule: &[String]) -> [u8; HALF_HOURS_PER_DAY] {
    let mut slots = [1u8; HALF_HOURS_PER_DAY];
    if schedule.is_empty() {
        return slots;
    }
    for (index, slot) in slots.iter_mut().enumerate() {
        let minutes = 30 * index;
        let start = format!("{:02}{:02}", minutes / 60, minutes % 60);
        let token = schedule
            .iter()
            .rev()
            .find(|token| token[..4] <= start[..])
            .unwrap_or(&schedule[schedule.len() - 1]);
        // validated by read_schedule, cannot fail
        *slot = u8::from_str_radix(&token[4..6], 16).unwrap_or(0);
    }
    slots
}

impl TariffProfile {
    /// Loads the year and day schedules from the meter.
    pub fn load<R: RegisterReader>(reader: &mut R) -> Result<Self, Iec61107Error> {
        let year = read_schedule(reader, OBIS_YEAR_SCHEDULE, YEAR_SCHEDULE_SLOTS)?;
        let day = read_schedule(reader, OBIS_DAY_SCHEDULE, DAY_SCHEDULE_SLOTS)?;
        Ok(Self::from_schedules(year, &day))
    }

    /// Builds a profile from already cleaned and sorted schedule tokens.
    pub fn from_schedules(year_schedule: Vec<String>, day_schedule: &[String]) -> Self {
        TariffProfile {
            year_schedule,
            day_tariffs: day_slot_tariffs(day_schedule),
        }
    }

    /// The per-half-hour tariff assignment of an ordinary day.
    pub fn day_tariffs(&self) -> &[u8; HALF_HOURS_PER_DAY] {
        &self.day_tariffs
    }

    /// The whole-day tariff override for `date`, if the year schedule lists
    /// it as a special day. The sentinel suffix 0x7F means "ordinary day".
    pub fn year_override(&self, date: NaiveDate) -> Option<u8> {
        let key = date.format("%m%d").to_string();
        let token = self.year_schedule.iter().find(|t| t.starts_with(&key))?;
        let tariff = u8::from_str_radix(&token[4..6], 16).ok()?;
        (tariff != TARIFF_ORDINARY_DAY).then_some(tariff)
    }

    /// Aggregates one day of half-hour records, guarding against the meter
    /// date rolling over while the registers are being read.
    pub fn collect_day<R: RegisterReader>(
        &self,
        reader: &mut R,
        date: NaiveDate,
    ) -> Result<Vec<HalfHourRecord>, Iec61107Error> {
        let mut meter_date = read_meter_date(reader)?;
        for attempt in 0..DATE_ROLLOVER_RETRIES {
            let days_ago = meter_date.signed_duration_since(date).num_days();
            if days_ago < 0 {
                return Err(Iec61107Error::FutureDate {
                    requested: date,
                    meter: meter_date,
                });
            }
            if days_ago > i64::from(MAX_PROFILE_DAYS_AGO) {
                return Err(Iec61107Error::DaysAgoOutOfRange(days_ago));
            }
            let mut totals = read_day_energies(reader, days_ago as u8)?;
            let deltas = read_half_hours(reader, days_ago as u8)?;
            let override_tariff = self.year_override(date);
            let midnight = date.and_time(NaiveTime::MIN);
            let mut records = Vec::with_capacity(HALF_HOURS_PER_DAY);
            for (index, &watts) in deltas.iter().enumerate() {
                let tariff = override_tariff.unwrap_or(self.day_tariffs[index]);
                if tariff == 0 || tariff > MAX_TARIFF_INDEX {
                    return Err(Iec61107Error::InvalidTariffIndex(tariff));
                }
                let half_hour_wh = watts / 2;
                totals[0] += half_hour_wh;
                totals[tariff as usize] += half_hour_wh;
                records.push(HalfHourRecord {
                    timestamp: midnight + Duration::minutes(30 * index as i64),
                    tariff,
                    energy_w: watts,
                    totals,
                });
            }
            let check = read_meter_date(reader)?;
            if check == meter_date {
                return Ok(records);
            }
            debug!(
                "meter date rolled over from {meter_date} to {check} during attempt {}",
                attempt + 1
            );
            meter_date = check;
        }
        Err(Iec61107Error::DateUnstable)
    }

    /// Aggregates every calendar day between the `start` and `stop`
    /// timestamps, newest day first. The first and last day's slot arrays are
    /// trimmed to the half hours the timestamps actually cover.
    pub fn collect_range<R: RegisterReader>(
        &self,
        reader: &mut R,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Vec<Vec<HalfHourRecord>>, Iec61107Error> {
        let start_date = start.date();
        let stop_date = stop.date();
        let mut days = Vec::new();
        let mut date = start_date;
        while date >= stop_date {
            let records = self.collect_day(reader, date)?;
            let mut begin = 0usize;
            let mut end = HALF_HOURS_PER_DAY - 1;
            let midnight = date.and_time(NaiveTime::MIN);
            if date == start_date {
                let seconds = start.signed_duration_since(midnight).num_seconds();
                begin = (seconds / 1800) as usize + usize::from(seconds % 1800 > 0);
            }
            if date == stop_date {
                let seconds = stop.signed_duration_since(midnight).num_seconds();
                end = ((seconds / 1800) as usize).min(HALF_HOURS_PER_DAY - 1);
            }
            if begin <= end {
                days.push(records[begin..=end].to_vec());
            } else {
                days.push(Vec::new());
            }
            date = date - Duration::days(1);
        }
        Ok(days)
    }

    /// Aggregates from today back `days_ago` whole days.
    pub fn collect_days_ago<R: RegisterReader>(
        &self,
        reader: &mut R,
        days_ago: u8,
    ) -> Result<Vec<Vec<HalfHourRecord>>, Iec61107Error> {
        if days_ago > MAX_PROFILE_DAYS_AGO {
            return Err(Iec61107Error::DaysAgoOutOfRange(i64::from(days_ago)));
        }
        let today = Local::now().date_naive();
        let start = today.and_time(NaiveTime::MIN);
        let oldest = today - Duration::days(i64::from(days_ago));
        let stop = oldest.and_time(NaiveTime::MIN) + Duration::seconds(86_399);
        self.collect_range(reader, start, stop)
    }
}

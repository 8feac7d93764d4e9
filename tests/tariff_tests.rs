//! Unit tests for the tariff profile engine: schedule handling, half-hour
//! tariff assignment, accumulation arithmetic and the date-rollover guard.
//! The engine is driven by a scripted register reader instead of a transport.

use chrono::NaiveDate;
use iec61107_rs::tariff::{
    read_day_energies, read_half_hours, read_month_energies, RegisterReader,
};
use iec61107_rs::{Iec61107Error, TariffProfile};
use std::collections::VecDeque;

/// Replays a fixed sequence of register reads, asserting the engine asks for
/// them in the expected order.
struct ScriptedReader {
    script: VecDeque<(String, String)>,
}

impl ScriptedReader {
    fn new(script: &[(&str, &str)]) -> Self {
        ScriptedReader {
            script: script
                .iter()
                .map(|(obis, value)| (obis.to_string(), value.to_string()))
                .collect(),
        }
    }

    fn finished(&self) -> bool {
        self.script.is_empty()
    }
}

impl RegisterReader for ScriptedReader {
    fn read_register(&mut self, code: &str) -> Result<String, Iec61107Error> {
        let (expected, value) = self
            .script
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected register read: {code}"));
        assert_eq!(expected, code, "register read out of order");
        Ok(value)
    }
}

fn tokens(day: &[&str]) -> Vec<String> {
    day.iter().map(|t| t.to_string()).collect()
}

/// A schedule register payload: the given tokens padded with unused slots.
fn schedule_register(entries: &[&str], slots: usize) -> String {
    let mut all: Vec<&str> = entries.to_vec();
    while all.len() < slots {
        all.push("000000");
    }
    all.join(",")
}

/// A half-hour register payload with the same delta in every slot.
fn half_hours_register(watts: i64) -> String {
    vec![watts.to_string(); 48].join(",")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Tests the day-table assignment vector: tariff 1 until 06:00, tariff 2
/// until 22:00, tariff 1 for the rest.
#[test]
fn test_day_table_assignment() {
    let profile = TariffProfile::from_schedules(vec![], &tokens(&["000001", "060002", "220001"]));
    let slots = profile.day_tariffs();
    for index in 0..=11 {
        assert_eq!(slots[index], 1, "slot {index}");
    }
    for index in 12..=43 {
        assert_eq!(slots[index], 2, "slot {index}");
    }
    for index in 44..=47 {
        assert_eq!(slots[index], 1, "slot {index}");
    }
}

/// Tests that an empty day table defaults everything to tariff 1 and a
/// single-entry table applies that entry everywhere.
#[test]
fn test_day_table_degenerate_cases() {
    let empty = TariffProfile::from_schedules(vec![], &[]);
    assert!(empty.day_tariffs().iter().all(|&t| t == 1));

    let single = TariffProfile::from_schedules(vec![], &tokens(&["080003"]));
    assert!(single.day_tariffs().iter().all(|&t| t == 3));
}

/// Tests that slots before the first day-table entry wrap to the last one.
#[test]
fn test_day_table_wraps_before_first_entry() {
    let profile = TariffProfile::from_schedules(vec![], &tokens(&["060002", "220001"]));
    let slots = profile.day_tariffs();
    // 00:00..05:30 precede the 06:00 entry and wrap to the 22:00 one
    for index in 0..=11 {
        assert_eq!(slots[index], 1, "slot {index}");
    }
    assert_eq!(slots[12], 2);
    assert_eq!(slots[44], 1);
}

/// Tests the year-schedule override lookup and the ordinary-day sentinel.
#[test]
fn test_year_override() {
    let profile = TariffProfile::from_schedules(
        vec!["010102".to_string(), "05097F".to_string()],
        &tokens(&["000001"]),
    );
    assert_eq!(profile.year_override(date(2026, 1, 1)), Some(2));
    // sentinel 0x7F: listed but ordinary
    assert_eq!(profile.year_override(date(2026, 5, 9)), None);
    assert_eq!(profile.year_override(date(2026, 3, 3)), None);
}

/// Tests loading the schedules from registers: zero slots dropped, tokens
/// sorted by date regardless of wire order.
#[test]
fn test_load_schedules() {
    let year = schedule_register(&["050902", "010103"], 32);
    let day = schedule_register(&["220001", "000001", "060002"], 8);
    let mut reader = ScriptedReader::new(&[
        ("0B0000FF", year.as_str()),
        ("0A0164FF", day.as_str()),
    ]);
    let profile = TariffProfile::load(&mut reader).unwrap();
    assert!(reader.finished());
    assert_eq!(profile.year_override(date(2026, 1, 1)), Some(3));
    assert_eq!(profile.year_override(date(2026, 5, 9)), Some(2));
    assert_eq!(profile.day_tariffs()[12], 2);
    assert_eq!(profile.day_tariffs()[47], 1);
}

/// Tests that a schedule register with the wrong slot count is rejected.
#[test]
fn test_load_schedules_wrong_count() {
    let year = schedule_register(&["050902"], 31);
    let mut reader = ScriptedReader::new(&[("0B0000FF", year.as_str())]);
    assert!(matches!(
        TariffProfile::load(&mut reader),
        Err(Iec61107Error::MalformedRegister { .. })
    ));
}

/// Tests the kWh to Wh conversion of the energies registers.
#[test]
fn test_read_day_energies() {
    let mut reader = ScriptedReader::new(&[("0F808000", "100.5,1.5,2.5,3.5,4.5")]);
    let energies = read_day_energies(&mut reader, 0).unwrap();
    assert_eq!(energies, [100_500, 1_500, 2_500, 3_500, 4_500]);
}

/// Tests the monthly energies helper and its offset bound.
#[test]
fn test_read_month_energies() {
    let mut reader = ScriptedReader::new(&[("0F08800C", "5.0,1.0,2.0,1.0,1.0")]);
    let energies = read_month_energies(&mut reader, 12).unwrap();
    assert_eq!(energies, [5_000, 1_000, 2_000, 1_000, 1_000]);

    let mut reader = ScriptedReader::new(&[]);
    assert!(matches!(
        read_month_energies(&mut reader, 13),
        Err(Iec61107Error::MonthsAgoOutOfRange(13))
    ));
}

/// Tests the day-offset bound of the half-hour register.
#[test]
fn test_read_half_hours_offset_bound() {
    let mut reader = ScriptedReader::new(&[]);
    assert!(matches!(
        read_half_hours(&mut reader, 128),
        Err(Iec61107Error::DaysAgoOutOfRange(128))
    ));
}

/// Tests that a malformed half-hour register payload is a data error.
#[test]
fn test_read_half_hours_malformed() {
    let mut reader = ScriptedReader::new(&[("63010000", "1,2,3")]);
    assert!(matches!(
        read_half_hours(&mut reader, 0),
        Err(Iec61107Error::MalformedRegister { .. })
    ));
}

/// Tests one day of accumulation: each 100 W half hour adds 50 Wh to the sum
/// and to its assigned bucket, on top of the cumulative day totals.
#[test]
fn test_collect_day_accumulation() {
    let profile = TariffProfile::from_schedules(vec![], &tokens(&["000001", "060002", "220001"]));
    let half_hours = half_hours_register(100);
    let mut reader = ScriptedReader::new(&[
        ("000902FF", "260807"),
        ("0F808000", "1.0,0.5,0.5,0.0,0.0"),
        ("63010000", half_hours.as_str()),
        ("000902FF", "260807"),
    ]);
    let records = profile.collect_day(&mut reader, date(2026, 8, 7)).unwrap();
    assert!(reader.finished());
    assert_eq!(records.len(), 48);

    let first = &records[0];
    assert_eq!(first.timestamp, date(2026, 8, 7).and_hms_opt(0, 0, 0).unwrap());
    assert_eq!(first.tariff, 1);
    assert_eq!(first.energy_w, 100);
    assert_eq!(first.totals, [1_050, 550, 500, 0, 0]);

    let noon = &records[24];
    assert_eq!(noon.timestamp, date(2026, 8, 7).and_hms_opt(12, 0, 0).unwrap());
    assert_eq!(noon.tariff, 2);

    // 16 slots on tariff 1, 32 on tariff 2, 50 Wh each
    let last = &records[47];
    assert_eq!(last.tariff, 1);
    assert_eq!(last.totals, [3_400, 1_300, 2_100, 0, 0]);
}

/// Tests that a special day from the year schedule overrides every slot.
#[test]
fn test_collect_day_with_override() {
    let profile = TariffProfile::from_schedules(
        vec!["080702".to_string()],
        &tokens(&["000001"]),
    );
    let half_hours = half_hours_register(100);
    let mut reader = ScriptedReader::new(&[
        ("000902FF", "260807"),
        ("0F808000", "0.0,0.0,0.0,0.0,0.0"),
        ("63010000", half_hours.as_str()),
        ("000902FF", "260807"),
    ]);
    let records = profile.collect_day(&mut reader, date(2026, 8, 7)).unwrap();
    assert!(records.iter().all(|r| r.tariff == 2));
    assert_eq!(records[47].totals, [2_400, 0, 2_400, 0, 0]);
}

/// Tests that a tariff index outside 1..=4 is a data error.
#[test]
fn test_collect_day_invalid_tariff() {
    let profile = TariffProfile::from_schedules(vec![], &tokens(&["000005"]));
    let half_hours = half_hours_register(100);
    let mut reader = ScriptedReader::new(&[
        ("000902FF", "260807"),
        ("0F808000", "0.0,0.0,0.0,0.0,0.0"),
        ("63010000", half_hours.as_str()),
    ]);
    assert!(matches!(
        profile.collect_day(&mut reader, date(2026, 8, 7)),
        Err(Iec61107Error::InvalidTariffIndex(5))
    ));
}

/// Tests that a request date ahead of the meter clock is fatal.
#[test]
fn test_collect_day_future_date() {
    let profile = TariffProfile::from_schedules(vec![], &[]);
    let mut reader = ScriptedReader::new(&[("000902FF", "260807")]);
    assert!(matches!(
        profile.collect_day(&mut reader, date(2026, 8, 8)),
        Err(Iec61107Error::FutureDate { .. })
    ));
}

/// Tests that a request date deeper than the register depth is rejected.
#[test]
fn test_collect_day_too_deep() {
    let profile = TariffProfile::from_schedules(vec![], &[]);
    let mut reader = ScriptedReader::new(&[("000902FF", "260807")]);
    assert!(matches!(
        profile.collect_day(&mut reader, date(2026, 1, 1)),
        Err(Iec61107Error::DaysAgoOutOfRange(_))
    ));
}

/// Tests the rollover guard: the meter date advances during the first read,
/// so the partial day is discarded and re-read at the corrected offset.
#[test]
fn test_collect_day_rollover_retry() {
    let profile = TariffProfile::from_schedules(vec![], &[]);
    let half_hours = half_hours_register(100);
    let mut reader = ScriptedReader::new(&[
        ("000902FF", "260807"),
        ("0F808000", "1.0,1.0,0.0,0.0,0.0"),
        ("63010000", half_hours.as_str()),
        // midnight passed while reading
        ("000902FF", "260808"),
        // retry: same request date is now one day back
        ("0F808001", "2.0,2.0,0.0,0.0,0.0"),
        ("63010001", half_hours.as_str()),
        ("000902FF", "260808"),
    ]);
    let records = profile.collect_day(&mut reader, date(2026, 8, 7)).unwrap();
    assert!(reader.finished());
    // totals come from the second, corrected read
    assert_eq!(records[0].totals, [2_050, 2_050, 0, 0, 0]);
}

/// Tests that three rollovers in a row exhaust the retries.
#[test]
fn test_collect_day_date_unstable() {
    let profile = TariffProfile::from_schedules(vec![], &[]);
    let half_hours = half_hours_register(0);
    let energies = "0.0,0.0,0.0,0.0,0.0";
    let mut reader = ScriptedReader::new(&[
        ("000902FF", "260807"),
        ("0F808000", energies),
        ("63010000", half_hours.as_str()),
        ("000902FF", "260808"),
        ("0F808001", energies),
        ("63010001", half_hours.as_str()),
        ("000902FF", "260809"),
        ("0F808002", energies),
        ("63010002", half_hours.as_str()),
        ("000902FF", "260810"),
    ]);
    assert!(matches!(
        profile.collect_day(&mut reader, date(2026, 8, 7)),
        Err(Iec61107Error::DateUnstable)
    ));
    assert!(reader.finished());
}

/// Tests multi-day range collection with first/last day trimming.
#[test]
fn test_collect_range_trims_edges() {
    let profile = TariffProfile::from_schedules(vec![], &[]);
    let half_hours = half_hours_register(100);
    let energies = "0.0,0.0,0.0,0.0,0.0";
    let mut reader = ScriptedReader::new(&[
        ("000902FF", "260807"),
        ("0F808000", energies),
        ("63010000", half_hours.as_str()),
        ("000902FF", "260807"),
        ("000902FF", "260807"),
        ("0F808001", energies),
        ("63010001", half_hours.as_str()),
        ("000902FF", "260807"),
    ]);
    let start = date(2026, 8, 7).and_hms_opt(1, 0, 0).unwrap();
    let stop = date(2026, 8, 6).and_hms_opt(22, 45, 0).unwrap();
    let days = profile.collect_range(&mut reader, start, stop).unwrap();
    assert!(reader.finished());
    assert_eq!(days.len(), 2);

    // newest day trimmed at the front: 01:00 onwards
    assert_eq!(days[0].len(), 46);
    assert_eq!(days[0][0].timestamp, start);

    // oldest day trimmed at the back: up to the slot containing 22:45
    assert_eq!(days[1].len(), 46);
    assert_eq!(
        days[1][0].timestamp,
        date(2026, 8, 6).and_hms_opt(0, 0, 0).unwrap()
    );
    assert_eq!(
        days[1][45].timestamp,
        date(2026, 8, 6).and_hms_opt(22, 30, 0).unwrap()
    );
}

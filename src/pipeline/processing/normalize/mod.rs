//! Normalization of raw show descriptions into canonical [`ShowRecord`]s.
//!
//! Two raw shapes are understood: export documents produced by another
//! deployment (see [`export`]) and structured records produced by automated
//! discovery (see [`discovery`]). Both end in [`finalize`], which enforces
//! the lineup and venue invariants every later stage relies on.

pub mod discovery;
pub mod export;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::{SetType, SourceMetadata};
use crate::error::{ImportError, Result};
use crate::pipeline::processing::batch::venue_key;

/// One raw record as handed to the engine
#[derive(Debug, Clone)]
pub enum RawInput {
    /// Structured-text export document
    Export(String),
    /// Discovery-produced structured record
    Discovery(serde_json::Value),
}

/// Unresolved reference to an artist billed on a show
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtistRef {
    pub name: String,
    pub position: u32,
    pub set_type: SetType,
}

/// Unresolved reference to a venue hosting a show
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VenueRef {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: Option<String>,
}

/// Canonical, normalized representation of one show
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowRecord {
    pub title: Option<String>,
    pub event_day: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub city: String,
    pub state: String,
    pub price: Option<String>,
    pub age_requirement: Option<String>,
    pub description: Option<String>,
    /// Sorted by position
    pub artists: Vec<ArtistRef>,
    /// Primary venue first
    pub venues: Vec<VenueRef>,
    /// Present only for automatically discovered records
    pub source: Option<SourceMetadata>,
    /// Listing status reported by the discovery source, if any
    pub source_status: Option<String>,
}

impl ShowRecord {
    /// Index into `artists` of the headliner: the lowest-position entry
    /// explicitly billed as headliner, else the lowest-position entry.
    pub fn headliner_index(&self) -> Option<usize> {
        let explicit = self
            .artists
            .iter()
            .enumerate()
            .filter(|(_, a)| a.set_type == SetType::Headliner)
            .min_by_key(|(_, a)| a.position)
            .map(|(i, _)| i);
        explicit.or_else(|| {
            self.artists
                .iter()
                .enumerate()
                .min_by_key(|(_, a)| a.position)
                .map(|(i, _)| i)
        })
    }

    pub fn headliner(&self) -> Option<&ArtistRef> {
        self.headliner_index().map(|i| &self.artists[i])
    }

    pub fn primary_venue(&self) -> Option<&VenueRef> {
        self.venues.first()
    }

    /// Short display label, e.g. `The National @ Valley Bar (2026-03-20)`
    pub fn label(&self) -> String {
        let headliner = self
            .headliner()
            .map(|a| a.name.as_str())
            .or(self.title.as_deref())
            .unwrap_or("Untitled show");
        match self.primary_venue() {
            Some(venue) => format!("{} @ {} ({})", headliner, venue.name, self.event_day),
            None => format!("{} ({})", headliner, self.event_day),
        }
    }
}

/// Parse one raw input into a canonical show record. Pure; no side effects.
pub fn parse(raw: &RawInput) -> Result<ShowRecord> {
    match raw {
        RawInput::Export(text) => export::parse_document(text),
        RawInput::Discovery(value) => discovery::parse_record(value),
    }
}

/// Trim and collapse whitespace; empty strings become `None`.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|v| !v.is_empty())
}

/// Apply the invariants shared by both input shapes
pub(crate) fn finalize(mut record: ShowRecord) -> Result<ShowRecord> {
    record.artists.retain(|a| !a.name.is_empty());
    record.artists.sort_by_key(|a| a.position);
    record.venues.retain(|v| !v.name.is_empty());
    // A venue listed twice is one venue
    let mut seen = HashSet::new();
    record
        .venues
        .retain(|v| seen.insert(venue_key(&v.name, &v.city)));

    if record.artists.is_empty() {
        return Err(ImportError::Validation(
            "show must list at least one artist".to_string(),
        ));
    }
    if record.venues.is_empty() {
        return Err(ImportError::Validation(
            "show must list at least one venue".to_string(),
        ));
    }
    for venue in &record.venues {
        if venue.city.is_empty() {
            return Err(ImportError::MissingField(format!("city of venue '{}'", venue.name)));
        }
    }

    // Show location falls back to the primary venue's
    if record.city.is_empty() {
        record.city = record.venues[0].city.clone();
    }
    if record.state.is_empty() {
        record.state = record.venues[0].state.clone();
    }
    Ok(record)
}

static TWELVE_HOUR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s*m?\.?\s*$").expect("valid regex")
});

/// Parse a time of day: `20:00`, `20:00:00`, `8pm`, `8:30 PM`.
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    if let Ok(t) = NaiveTime::parse_from_str(trimmed, "%H:%M:%S") {
        return Ok(t);
    }
    if let Ok(t) = NaiveTime::parse_from_str(trimmed, "%H:%M") {
        return Ok(t);
    }
    if let Some(caps) = TWELVE_HOUR.captures(trimmed) {
        let hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).unwrap_or(60);
        let pm = caps[3].eq_ignore_ascii_case("p");
        if (1..=12).contains(&hour) {
            let hour24 = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, false) => h,
                (h, true) => h + 12,
            };
            if let Some(t) = NaiveTime::from_hms_opt(hour24, minute, 0) {
                return Ok(t);
            }
        }
    }
    Err(ImportError::Parse(format!("unrecognized time '{}'", value)))
}

/// Parse an event date, optionally carrying a time of day:
/// `2026-03-20`, `2026-03-20T20:00[:00]`, `2026-03-20 20:00`, RFC 3339, `03/20/2026`.
pub fn parse_event_date(value: &str) -> Result<(NaiveDate, Option<NaiveTime>)> {
    let trimmed = value.trim();
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok((day, None));
    }
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        return Ok((day, None));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok((dt.date(), Some(dt.time())));
        }
    }
    // Local wall-clock time of the listing is what matters, not UTC
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        let local = dt.naive_local();
        return Ok((local.date(), Some(local.time())));
    }
    Err(ImportError::Parse(format!("unparseable event date '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(name: &str, position: u32, set_type: SetType) -> ArtistRef {
        ArtistRef {
            name: name.to_string(),
            position,
            set_type,
        }
    }

    fn record(artists: Vec<ArtistRef>) -> ShowRecord {
        ShowRecord {
            title: None,
            event_day: NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
            start_time: None,
            city: String::new(),
            state: String::new(),
            price: None,
            age_requirement: None,
            description: None,
            artists,
            venues: vec![VenueRef {
                name: "Valley Bar".to_string(),
                city: "Phoenix".to_string(),
                state: "AZ".to_string(),
                address: None,
            }],
            source: None,
            source_status: None,
        }
    }

    #[test]
    fn test_repeated_venue_is_listed_once() {
        let mut r = record(vec![artist("Main", 0, SetType::Headliner)]);
        r.venues.push(VenueRef {
            name: "VALLEY BAR".to_string(),
            city: "phoenix".to_string(),
            state: "AZ".to_string(),
            address: None,
        });
        r.venues.push(VenueRef {
            name: "Valley Bar".to_string(),
            city: "Tempe".to_string(),
            state: "AZ".to_string(),
            address: None,
        });
        let r = finalize(r).unwrap();
        let cities: Vec<&str> = r.venues.iter().map(|v| v.city.as_str()).collect();
        assert_eq!(cities, vec!["Phoenix", "Tempe"]);
    }

    #[test]
    fn test_headliner_defaults_to_lowest_position() {
        let r = record(vec![
            artist("Opener", 2, SetType::Performer),
            artist("Main", 1, SetType::Performer),
        ]);
        assert_eq!(r.headliner().unwrap().name, "Main");
    }

    #[test]
    fn test_explicit_headliner_wins_over_position() {
        let r = record(vec![
            artist("Opener", 0, SetType::Opener),
            artist("Main", 3, SetType::Headliner),
        ]);
        assert_eq!(r.headliner().unwrap().name, "Main");
    }

    #[test]
    fn test_finalize_rejects_empty_lineup() {
        let r = record(vec![artist("", 0, SetType::Performer)]);
        let err = finalize(r).unwrap_err();
        assert!(matches!(err, ImportError::Validation(_)));
    }

    #[test]
    fn test_finalize_fills_location_from_venue() {
        let r = finalize(record(vec![artist("Main", 0, SetType::Performer)])).unwrap();
        assert_eq!(r.city, "Phoenix");
        assert_eq!(r.state, "AZ");
        assert_eq!(r.label(), "Main @ Valley Bar (2026-03-20)");
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("20:00").unwrap(), NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        assert_eq!(parse_time("8pm").unwrap(), NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        assert_eq!(parse_time("8:30 PM").unwrap(), NaiveTime::from_hms_opt(20, 30, 0).unwrap());
        assert_eq!(parse_time("12 a.m.").unwrap(), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert!(parse_time("13pm").is_err());
        assert!(parse_time("doors at eight").is_err());
    }

    #[test]
    fn test_parse_event_date_formats() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();
        assert_eq!(parse_event_date("2026-03-20").unwrap(), (day, None));
        assert_eq!(parse_event_date("03/20/2026").unwrap(), (day, None));
        let (d, t) = parse_event_date("2026-03-20T19:30").unwrap();
        assert_eq!(d, day);
        assert_eq!(t, NaiveTime::from_hms_opt(19, 30, 0));
        let (d, t) = parse_event_date("2026-03-20T23:00:00-07:00").unwrap();
        assert_eq!(d, day);
        assert_eq!(t, NaiveTime::from_hms_opt(23, 0, 0));
        assert!(parse_event_date("next friday").is_err());
    }
}

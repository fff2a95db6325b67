//! Export documents: TOML front matter between `+++` fences followed by the
//! free-text description.
//!
//! ```text
//! +++
//! schema_version = "1.0"
//! exported_at = "2026-03-01T12:00:00+00:00"
//!
//! [show]
//! date = "2026-03-20"
//! time = "20:00"
//! city = "Phoenix"
//! state = "AZ"
//!
//! [[venues]]
//! name = "Valley Bar"
//! city = "Phoenix"
//! state = "AZ"
//!
//! [[artists]]
//! name = "The National"
//! position = 0
//! set_type = "headliner"
//! +++
//! Free text description.
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{clean_text, finalize, parse_event_date, parse_time, ArtistRef, ShowRecord, VenueRef};
use crate::constants::{EXPORT_FENCE, EXPORT_SCHEMA_VERSION};
use crate::domain::{Artist, SetType, Show, Venue};
use crate::error::{ImportError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FrontMatter {
    schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exported_at: Option<String>,
    show: ShowSection,
    #[serde(default)]
    venues: Vec<VenueEntry>,
    #[serde(default)]
    artists: Vec<ArtistEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShowSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    age_requirement: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VenueEntry {
    name: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtistEntry {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    set_type: Option<String>,
}

/// Split a document into its front matter and body
fn split_document(text: &str) -> Result<(&str, &str)> {
    let text = text.trim_start_matches('\u{feff}').trim_start();
    let rest = text
        .strip_prefix(EXPORT_FENCE)
        .ok_or_else(|| ImportError::Parse("export document must start with '+++'".to_string()))?;

    // Closing fence must sit on its own line
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == EXPORT_FENCE && offset > 0 {
            let front = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((front, body));
        }
        offset += line.len();
    }
    Err(ImportError::Parse("export document is missing its closing '+++'".to_string()))
}

fn check_schema_version(version: &str) -> Result<()> {
    let major = |v: &str| v.split('.').next().unwrap_or_default().trim().to_string();
    if major(version) != major(EXPORT_SCHEMA_VERSION) {
        return Err(ImportError::Parse(format!(
            "unsupported export schema version '{}' (expected {})",
            version, EXPORT_SCHEMA_VERSION
        )));
    }
    Ok(())
}

/// Parse an export document into a show record
pub fn parse_document(text: &str) -> Result<ShowRecord> {
    let (front, body) = split_document(text)?;
    let meta: FrontMatter = toml::from_str(front)
        .map_err(|e| ImportError::Parse(format!("malformed export front matter: {}", e)))?;

    check_schema_version(&meta.schema_version)?;
    if let Some(exported_at) = &meta.exported_at {
        DateTime::parse_from_rfc3339(exported_at).map_err(|_| {
            ImportError::Parse(format!("malformed export timestamp '{}'", exported_at))
        })?;
    }

    let (event_day, date_time) = parse_event_date(&meta.show.date)?;
    let start_time = match clean_text(meta.show.time.as_deref()) {
        Some(t) => Some(parse_time(&t)?),
        None => date_time,
    };

    let mut artists = Vec::with_capacity(meta.artists.len());
    for (index, entry) in meta.artists.iter().enumerate() {
        let set_type = match &entry.set_type {
            Some(s) => s.parse::<SetType>()?,
            None => SetType::default(),
        };
        artists.push(ArtistRef {
            name: clean_text(Some(&entry.name)).unwrap_or_default(),
            position: entry.position.unwrap_or(index as u32),
            set_type,
        });
    }

    let venues = meta
        .venues
        .iter()
        .map(|entry| VenueRef {
            name: clean_text(Some(&entry.name)).unwrap_or_default(),
            city: clean_text(Some(&entry.city)).unwrap_or_default(),
            state: clean_text(Some(&entry.state)).unwrap_or_default(),
            address: clean_text(entry.address.as_deref()),
        })
        .collect();

    let description = Some(body.trim()).filter(|d| !d.is_empty()).map(str::to_string);

    finalize(ShowRecord {
        title: clean_text(meta.show.title.as_deref()),
        event_day,
        start_time,
        city: clean_text(Some(&meta.show.city)).unwrap_or_default(),
        state: clean_text(Some(&meta.show.state)).unwrap_or_default(),
        price: clean_text(meta.show.price.as_deref()),
        age_requirement: clean_text(meta.show.age_requirement.as_deref()),
        description,
        artists,
        venues,
        source: None,
        source_status: None,
    })
}

/// Render a show record as an export document
pub fn render_document(record: &ShowRecord, exported_at: DateTime<Utc>) -> Result<String> {
    let meta = FrontMatter {
        schema_version: EXPORT_SCHEMA_VERSION.to_string(),
        exported_at: Some(exported_at.to_rfc3339()),
        show: ShowSection {
            title: record.title.clone(),
            date: record.event_day.to_string(),
            time: record.start_time.map(|t| {
                if t.format("%S").to_string() == "00" {
                    t.format("%H:%M").to_string()
                } else {
                    t.format("%H:%M:%S").to_string()
                }
            }),
            city: record.city.clone(),
            state: record.state.clone(),
            price: record.price.clone(),
            age_requirement: record.age_requirement.clone(),
        },
        venues: record
            .venues
            .iter()
            .map(|v| VenueEntry {
                name: v.name.clone(),
                city: v.city.clone(),
                state: v.state.clone(),
                address: v.address.clone(),
            })
            .collect(),
        artists: record
            .artists
            .iter()
            .map(|a| ArtistEntry {
                name: a.name.clone(),
                position: Some(a.position),
                set_type: Some(a.set_type.as_str().to_string()),
            })
            .collect(),
    };

    let mut front = toml::to_string(&meta)?;
    if !front.ends_with('\n') {
        front.push('\n');
    }
    let mut doc = format!("{fence}\n{front}{fence}\n", fence = EXPORT_FENCE, front = front);
    if let Some(description) = &record.description {
        doc.push('\n');
        doc.push_str(description);
        doc.push('\n');
    }
    Ok(doc)
}

/// Build the record an export of a persisted show carries.
///
/// `artists` and `venues` must contain every entity the show references.
pub fn record_from_catalog(show: &Show, artists: &[Artist], venues: &[Venue]) -> Result<ShowRecord> {
    let mut artist_refs = Vec::with_capacity(show.lineup.len());
    for entry in &show.lineup {
        let artist = artists
            .iter()
            .find(|a| a.id == Some(entry.artist_id))
            .ok_or_else(|| ImportError::MissingField(format!("artist {}", entry.artist_id)))?;
        artist_refs.push(ArtistRef {
            name: artist.name.clone(),
            position: entry.position,
            set_type: entry.set_type,
        });
    }

    let mut venue_refs = Vec::with_capacity(show.venue_ids.len());
    for venue_id in &show.venue_ids {
        let venue = venues
            .iter()
            .find(|v| v.id == Some(*venue_id))
            .ok_or_else(|| ImportError::MissingField(format!("venue {}", venue_id)))?;
        venue_refs.push(VenueRef {
            name: venue.name.clone(),
            city: venue.city.clone(),
            state: venue.state.clone(),
            address: venue.address.clone(),
        });
    }

    finalize(ShowRecord {
        title: show.title.clone(),
        event_day: show.event_day,
        start_time: show.start_time,
        city: show.city.clone(),
        state: show.state.clone(),
        price: show.price.clone(),
        age_requirement: show.age_requirement.clone(),
        description: show.description.as_deref().map(str::trim).map(str::to_string),
        artists: artist_refs,
        venues: venue_refs,
        source: None,
        source_status: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    const SAMPLE: &str = r#"+++
schema_version = "1.0"
exported_at = "2026-03-01T12:00:00+00:00"

[show]
title = "Laugh Track Tour"
date = "2026-03-20"
time = "8:00 PM"
city = "Phoenix"
state = "AZ"
price = "$45"
age_requirement = "16+"

[[venues]]
name = "Valley Bar"
city = "Phoenix"
state = "AZ"
address = "130 N Central Ave"

[[artists]]
name = "Lucius"
position = 1
set_type = "opener"

[[artists]]
name = "The National"
position = 0
set_type = "headliner"
+++

Doors at 7.
Two sets.
"#;

    #[test]
    fn test_parse_sample_document() {
        let record = parse_document(SAMPLE).unwrap();
        assert_eq!(record.title.as_deref(), Some("Laugh Track Tour"));
        assert_eq!(record.event_day, NaiveDate::from_ymd_opt(2026, 3, 20).unwrap());
        assert_eq!(record.start_time, NaiveTime::from_hms_opt(20, 0, 0));
        assert_eq!(record.artists[0].name, "The National");
        assert_eq!(record.artists[1].set_type, SetType::Opener);
        assert_eq!(record.venues[0].address.as_deref(), Some("130 N Central Ave"));
        assert_eq!(record.description.as_deref(), Some("Doors at 7.\nTwo sets."));
        assert!(record.source.is_none());
    }

    #[test]
    fn test_render_then_parse_preserves_every_field() {
        let record = parse_document(SAMPLE).unwrap();
        let exported_at = Utc.with_ymd_and_hms(2026, 4, 1, 9, 30, 0).unwrap();
        let doc = render_document(&record, exported_at).unwrap();
        assert!(doc.starts_with("+++\n"));
        assert_eq!(parse_document(&doc).unwrap(), record);
    }

    #[test]
    fn test_missing_position_uses_document_order() {
        let doc = "+++\nschema_version = \"1.0\"\n[show]\ndate = \"2026-05-01\"\n\
                   [[venues]]\nname = \"Crescent Ballroom\"\ncity = \"Phoenix\"\nstate = \"AZ\"\n\
                   [[artists]]\nname = \"A\"\n[[artists]]\nname = \"B\"\n+++\n";
        let record = parse_document(doc).unwrap();
        assert_eq!(record.artists[1].position, 1);
        assert_eq!(record.artists[1].set_type, SetType::Performer);
        assert_eq!(record.headliner().unwrap().name, "A");
        assert_eq!(record.city, "Phoenix");
        assert!(record.description.is_none());
    }

    #[test]
    fn test_unsupported_schema_version() {
        let doc = SAMPLE.replace("schema_version = \"1.0\"", "schema_version = \"2.0\"");
        let err = parse_document(&doc).unwrap_err();
        assert!(err.reason().contains("unsupported export schema version"));
    }

    #[test]
    fn test_bad_date_is_a_parse_error() {
        let doc = SAMPLE.replace("2026-03-20", "someday");
        assert!(matches!(parse_document(&doc), Err(ImportError::Parse(_))));
    }

    #[test]
    fn test_document_without_venues_fails_validation() {
        let doc = "+++\nschema_version = \"1.0\"\n[show]\ndate = \"2026-05-01\"\n\
                   [[artists]]\nname = \"A\"\n+++\n";
        assert!(matches!(parse_document(doc), Err(ImportError::Validation(_))));
    }

    #[test]
    fn test_missing_fence() {
        assert!(matches!(
            parse_document("schema_version = \"1.0\""),
            Err(ImportError::Parse(_))
        ));
        assert!(matches!(
            parse_document("+++\nschema_version = \"1.0\"\n"),
            Err(ImportError::Parse(_))
        ));
    }
}

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{clean_text, finalize, parse_event_date, parse_time, ArtistRef, ShowRecord, VenueRef};
use crate::domain::{SetType, SourceMetadata};
use crate::pipeline::processing::batch::artist_key;
use crate::error::{ImportError, Result};

static SCHEMA_JSON: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../../../schemas/discovery_record.v1.json"))
        .unwrap_or(Value::Null)
});

static BILLING_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:with|w/|\+)\s+").expect("valid regex"));

static SCHEMA: Lazy<std::result::Result<JSONSchema, String>> = Lazy::new(|| {
    JSONSchema::options()
        .compile(&SCHEMA_JSON)
        .map_err(|e| e.to_string())
});

/// Structured record produced by automated discovery
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryRecord {
    pub source: String,
    pub source_event_id: Value,
    #[serde(default)]
    pub title: Option<String>,
    pub date: String,
    #[serde(default)]
    pub time: Option<String>,
    pub venue_name: String,
    pub venue_city: String,
    pub venue_state: String,
    #[serde(default)]
    pub venue_address: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub headliner: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub age_restriction: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Check a raw value against the discovery record schema
pub fn validate_schema(value: &Value) -> Result<()> {
    let schema = SCHEMA
        .as_ref()
        .map_err(|e| ImportError::Config(format!("discovery schema failed to compile: {}", e)))?;
    if let Err(errors) = schema.validate(value) {
        let reasons: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{} at {}", e, path)
                }
            })
            .collect();
        return Err(ImportError::Parse(format!(
            "invalid discovery record: {}",
            reasons.join("; ")
        )));
    }
    Ok(())
}

/// Parse a discovery record into a show record
pub fn parse_record(value: &Value) -> Result<ShowRecord> {
    validate_schema(value)?;
    let record: DiscoveryRecord = serde_json::from_value(value.clone())
        .map_err(|e| ImportError::Parse(format!("invalid discovery record: {}", e)))?;

    let source_event_id = match &record.source_event_id {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if source_event_id.is_empty() {
        return Err(ImportError::MissingField("source_event_id".to_string()));
    }

    let (event_day, date_time) = parse_event_date(&record.date)?;
    let start_time = match clean_text(record.time.as_deref()) {
        Some(t) => Some(parse_time(&t)?),
        None => date_time,
    };

    let title = clean_text(record.title.as_deref());
    let mut names: Vec<String> = record
        .artists
        .iter()
        .filter_map(|a| clean_text(Some(a)))
        .collect();
    if names.is_empty() {
        names = title
            .as_deref()
            .and_then(extract_artists_from_title)
            .unwrap_or_default();
    }

    let venue = VenueRef {
        name: clean_text(Some(&record.venue_name)).unwrap_or_default(),
        city: clean_text(Some(&record.venue_city)).unwrap_or_default(),
        state: clean_text(Some(&record.venue_state)).unwrap_or_default(),
        address: clean_text(record.venue_address.as_deref()),
    };

    finalize(ShowRecord {
        title,
        event_day,
        start_time,
        city: venue.city.clone(),
        state: venue.state.clone(),
        price: record.price.as_ref().and_then(format_price),
        age_requirement: clean_text(record.age_restriction.as_deref()),
        description: clean_text(record.description.as_deref()),
        artists: build_lineup(names, clean_text(record.headliner.as_deref())),
        venues: vec![venue],
        source: Some(SourceMetadata {
            origin: record.source.trim().to_string(),
            source_event_id,
        }),
        source_status: clean_text(record.status.as_deref()).map(|s| s.to_lowercase()),
    })
}

/// Order the lineup; a named headliner is moved to the top, inserted if absent.
fn build_lineup(mut names: Vec<String>, headliner: Option<String>) -> Vec<ArtistRef> {
    if let Some(headliner) = &headliner {
        let existing = names
            .iter()
            .position(|n| artist_key(n) == artist_key(headliner));
        let name = match existing {
            Some(i) => names.remove(i),
            None => headliner.clone(),
        };
        names.insert(0, name);
    }

    names
        .into_iter()
        .enumerate()
        .map(|(position, name)| ArtistRef {
            name,
            position: position as u32,
            set_type: if position == 0 && headliner.is_some() {
                SetType::Headliner
            } else {
                SetType::Performer
            },
        })
        .collect()
}

fn format_price(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_f64().map(|p| {
            if p.fract() == 0.0 {
                format!("${}", p as i64)
            } else {
                format!("${:.2}", p)
            }
        }),
        Value::String(s) => clean_text(Some(s)),
        _ => None,
    }
}

/// Extract artist names from a listing title using basic heuristics
fn extract_artists_from_title(title: &str) -> Option<Vec<String>> {
    // Skip event types that don't typically have billed artists
    let lower_title = title.to_lowercase();
    if ["open mic", "karaoke", "trivia", "bingo"]
        .iter()
        .any(|k| lower_title.contains(k))
    {
        return None;
    }

    let parts: Vec<String> = BILLING_SEPARATOR
        .split(title)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() >= 2 {
        return Some(parts);
    }

    Some(vec![title.trim().to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "source": "venuepilot",
            "source_event_id": "vp-1042",
            "title": "The National with Lucius",
            "date": "2026-03-20",
            "time": "8pm",
            "venue_name": "Valley Bar",
            "venue_city": "Phoenix",
            "venue_state": "AZ",
            "artists": ["The National", "Lucius"],
            "price": 25,
            "age_restriction": "21+"
        })
    }

    #[test]
    fn test_parse_discovery_record() {
        let record = parse_record(&sample()).unwrap();
        assert_eq!(record.event_day, NaiveDate::from_ymd_opt(2026, 3, 20).unwrap());
        assert_eq!(record.start_time, NaiveTime::from_hms_opt(20, 0, 0));
        assert_eq!(record.headliner().unwrap().name, "The National");
        assert_eq!(record.artists[1].set_type, SetType::Performer);
        assert_eq!(record.price.as_deref(), Some("$25"));
        assert_eq!(record.city, "Phoenix");
        let source = record.source.unwrap();
        assert_eq!(source.origin, "venuepilot");
        assert_eq!(source.source_event_id, "vp-1042");
    }

    #[test]
    fn test_named_headliner_moves_to_top() {
        let mut value = sample();
        value["headliner"] = json!("lucius");
        let record = parse_record(&value).unwrap();
        assert_eq!(record.artists[0].name, "Lucius");
        assert_eq!(record.artists[0].set_type, SetType::Headliner);
        assert_eq!(record.artists[1].position, 1);
    }

    #[test]
    fn test_artists_fall_back_to_title() {
        let mut value = sample();
        value["artists"] = json!([]);
        let record = parse_record(&value).unwrap();
        let names: Vec<&str> = record.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["The National", "Lucius"]);
    }

    #[test]
    fn test_title_fallback_handles_non_ascii_text() {
        let mut value = sample();
        value["artists"] = json!([]);
        value["title"] = json!("İ with éclair");
        let record = parse_record(&value).unwrap();
        let names: Vec<&str> = record.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["İ", "éclair"]);

        value["title"] = json!("Sigur Rós W/ Álfheimr + Ísafold");
        let record = parse_record(&value).unwrap();
        let names: Vec<&str> = record.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Sigur Rós", "Álfheimr", "Ísafold"]);
    }

    #[test]
    fn test_named_headliner_matches_non_ascii_case() {
        let mut value = sample();
        value["artists"] = json!(["Sigur Rós", "Lucius"]);
        value["headliner"] = json!("SIGUR RÓS");
        let record = parse_record(&value).unwrap();
        assert_eq!(record.artists.len(), 2);
        assert_eq!(record.artists[0].name, "Sigur Rós");
        assert_eq!(record.artists[0].set_type, SetType::Headliner);
    }

    #[test]
    fn test_trivia_night_has_no_artists() {
        let mut value = sample();
        value["artists"] = json!([]);
        value["title"] = json!("Tuesday Trivia");
        assert!(matches!(parse_record(&value), Err(ImportError::Validation(_))));
    }

    #[test]
    fn test_schema_violation_is_a_parse_error() {
        let mut value = sample();
        value.as_object_mut().unwrap().remove("venue_name");
        let err = parse_record(&value).unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
        assert!(err.reason().contains("venue_name"));
    }

    #[test]
    fn test_numeric_source_id_and_fractional_price() {
        let mut value = sample();
        value["source_event_id"] = json!(881);
        value["price"] = json!(12.5);
        value["status"] = json!("Cancelled");
        let record = parse_record(&value).unwrap();
        assert_eq!(record.source.unwrap().source_event_id, "881");
        assert_eq!(record.price.as_deref(), Some("$12.50"));
        assert_eq!(record.source_status.as_deref(), Some("cancelled"));
    }
}

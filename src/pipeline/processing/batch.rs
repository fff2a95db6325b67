use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::SourceMetadata;

/// Namespace for placeholder identifiers handed out in Preview
const PLACEHOLDER_NAMESPACE: Uuid = Uuid::from_u128(0x5d3a_91c2_6f4e_4b7a_9c1d_2e8f_7a60_b413);

/// Deterministic identifier for an entity planned but not written
pub fn placeholder_id(kind: &str, key: &str) -> Uuid {
    Uuid::new_v5(&PLACEHOLDER_NAMESPACE, format!("{}:{}", kind, key).as_bytes())
}

pub fn artist_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn venue_key(name: &str, city: &str) -> (String, String) {
    (name.trim().to_lowercase(), city.trim().to_lowercase())
}

#[derive(Debug, Clone)]
pub struct CachedArtist {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CachedVenue {
    pub id: Uuid,
    pub name: String,
    pub city: String,
}

/// A show created (Commit) or planned (Preview) earlier in the batch
#[derive(Debug, Clone)]
pub struct PlannedShow {
    pub id: Uuid,
    pub headliner_id: Uuid,
    pub venue_ids: Vec<Uuid>,
    pub event_day: NaiveDate,
    pub label: String,
    pub source: Option<SourceMetadata>,
}

impl PlannedShow {
    pub fn primary_venue_id(&self) -> Option<Uuid> {
        self.venue_ids.first().copied()
    }
}

/// Per-batch memo of creation decisions.
///
/// Both modes record into it the same way, so a later record in the batch
/// sees an earlier record's artists, venues and show whether they were
/// written or only planned.
#[derive(Debug, Default)]
pub struct BatchCache {
    artists: HashMap<String, CachedArtist>,
    venues: HashMap<(String, String), CachedVenue>,
    shows: Vec<PlannedShow>,
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artist(&self, name: &str) -> Option<&CachedArtist> {
        self.artists.get(&artist_key(name))
    }

    pub fn remember_artist(&mut self, name: &str, id: Uuid) {
        self.artists.insert(
            artist_key(name),
            CachedArtist {
                id,
                name: name.trim().to_string(),
            },
        );
    }

    pub fn artists(&self) -> impl Iterator<Item = &CachedArtist> {
        self.artists.values()
    }

    pub fn venue(&self, name: &str, city: &str) -> Option<&CachedVenue> {
        self.venues.get(&venue_key(name, city))
    }

    pub fn remember_venue(&mut self, name: &str, city: &str, id: Uuid) {
        self.venues.insert(
            venue_key(name, city),
            CachedVenue {
                id,
                name: name.trim().to_string(),
                city: city.trim().to_string(),
            },
        );
    }

    pub fn venues(&self) -> impl Iterator<Item = &CachedVenue> {
        self.venues.values()
    }

    /// Record a show; a later entry with the same id replaces the earlier one.
    pub fn remember_show(&mut self, show: PlannedShow) {
        match self.shows.iter_mut().find(|s| s.id == show.id) {
            Some(existing) => *existing = show,
            None => self.shows.push(show),
        }
    }

    pub fn has_show(&self, id: Uuid) -> bool {
        self.shows.iter().any(|s| s.id == id)
    }

    pub fn show_by_source(&self, source: &SourceMetadata) -> Option<&PlannedShow> {
        self.shows.iter().find(|s| s.source.as_ref() == Some(source))
    }

    pub fn show_by_headliner_venue_date(
        &self,
        headliner_id: Uuid,
        venue_id: Uuid,
        event_day: NaiveDate,
    ) -> Option<&PlannedShow> {
        self.shows.iter().find(|s| {
            s.headliner_id == headliner_id
                && s.primary_venue_id() == Some(venue_id)
                && s.event_day == event_day
        })
    }

    pub fn shows_at(&self, venue_id: Uuid, event_day: NaiveDate) -> Vec<&PlannedShow> {
        self.shows
            .iter()
            .filter(|s| s.event_day == event_day && s.venue_ids.contains(&venue_id))
            .collect()
    }
}

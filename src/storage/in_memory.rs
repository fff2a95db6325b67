use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::Repository;
use crate::domain::{Artist, Show, Venue};
use crate::error::{ImportError, Result};

/// In-memory repository implementation for development/testing
#[derive(Clone)]
pub struct InMemoryRepository {
    artists: Arc<Mutex<HashMap<Uuid, Artist>>>,
    venues: Arc<Mutex<HashMap<Uuid, Venue>>>,
    shows: Arc<Mutex<HashMap<Uuid, Show>>>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            artists: Arc::new(Mutex::new(HashMap::new())),
            venues: Arc::new(Mutex::new(HashMap::new())),
            shows: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ImportError::Persistence("in-memory repository lock poisoned".to_string()))
}

fn sorted_by_name<T, F: Fn(&T) -> String>(mut items: Vec<T>, key: F) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        let artists = lock(&self.artists)?;
        let needle = name.trim().to_lowercase();
        Ok(artists
            .values()
            .find(|a| a.name.to_lowercase() == needle)
            .cloned())
    }

    async fn list_artists(&self) -> Result<Vec<Artist>> {
        let artists = lock(&self.artists)?;
        Ok(sorted_by_name(artists.values().cloned().collect(), |a: &Artist| {
            a.name.to_lowercase()
        }))
    }

    async fn get_artist(&self, artist_id: Uuid) -> Result<Option<Artist>> {
        let artists = lock(&self.artists)?;
        Ok(artists.get(&artist_id).cloned())
    }

    async fn create_artist(&self, artist: &mut Artist) -> Result<()> {
        let id = Uuid::new_v4();
        artist.id = Some(id);

        let mut artists = lock(&self.artists)?;
        artists.insert(id, artist.clone());

        debug!("Created artist: {} with id {}", artist.name, id);
        Ok(())
    }

    async fn find_venue_by_name_and_city(&self, name: &str, city: &str) -> Result<Option<Venue>> {
        let venues = lock(&self.venues)?;
        let name = name.trim().to_lowercase();
        let city = city.trim().to_lowercase();
        Ok(venues
            .values()
            .find(|v| v.name_lower == name && v.city.to_lowercase() == city)
            .cloned())
    }

    async fn list_venues(&self) -> Result<Vec<Venue>> {
        let venues = lock(&self.venues)?;
        Ok(sorted_by_name(venues.values().cloned().collect(), |v: &Venue| {
            format!("{}\u{0}{}", v.name_lower, v.city.to_lowercase())
        }))
    }

    async fn get_venue(&self, venue_id: Uuid) -> Result<Option<Venue>> {
        let venues = lock(&self.venues)?;
        Ok(venues.get(&venue_id).cloned())
    }

    async fn create_venue(&self, venue: &mut Venue) -> Result<()> {
        let id = Uuid::new_v4();
        venue.id = Some(id);

        let mut venues = lock(&self.venues)?;
        venues.insert(id, venue.clone());

        debug!("Created venue: {} ({}) with id {}", venue.name, venue.city, id);
        Ok(())
    }

    async fn find_show_by_headliner_venue_date(
        &self,
        headliner_id: Uuid,
        venue_id: Uuid,
        event_day: NaiveDate,
    ) -> Result<Option<Show>> {
        let shows = lock(&self.shows)?;
        Ok(shows
            .values()
            .find(|s| {
                s.headliner_id == headliner_id
                    && s.primary_venue_id() == Some(venue_id)
                    && s.event_day == event_day
            })
            .cloned())
    }

    async fn find_show_by_source_id(
        &self,
        origin: &str,
        source_event_id: &str,
    ) -> Result<Option<Show>> {
        let shows = lock(&self.shows)?;
        Ok(shows
            .values()
            .find(|s| {
                s.source
                    .as_ref()
                    .is_some_and(|src| src.origin == origin && src.source_event_id == source_event_id)
            })
            .cloned())
    }

    async fn find_shows_by_venue_and_date(
        &self,
        venue_id: Uuid,
        event_day: NaiveDate,
    ) -> Result<Vec<Show>> {
        let shows = lock(&self.shows)?;
        let mut found: Vec<Show> = shows
            .values()
            .filter(|s| s.event_day == event_day && s.venue_ids.contains(&venue_id))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.created_at);
        Ok(found)
    }

    async fn get_show(&self, show_id: Uuid) -> Result<Option<Show>> {
        let shows = lock(&self.shows)?;
        Ok(shows.get(&show_id).cloned())
    }

    async fn list_shows(&self) -> Result<Vec<Show>> {
        let shows = lock(&self.shows)?;
        let mut all: Vec<Show> = shows.values().cloned().collect();
        all.sort_by(|a, b| a.event_day.cmp(&b.event_day).then(a.created_at.cmp(&b.created_at)));
        Ok(all)
    }

    async fn create_show(&self, show: &mut Show) -> Result<()> {
        let id = Uuid::new_v4();
        show.id = Some(id);

        let mut shows = lock(&self.shows)?;
        shows.insert(id, show.clone());

        debug!("Created show {} on {}", id, show.event_day);
        Ok(())
    }

    async fn update_show(&self, show: &Show) -> Result<()> {
        let show_id = show.id.ok_or_else(|| {
            ImportError::Persistence("Cannot update show without ID".to_string())
        })?;

        let mut shows = lock(&self.shows)?;
        if !shows.contains_key(&show_id) {
            return Err(ImportError::Persistence(format!("Show {} does not exist", show_id)));
        }
        let mut updated = show.clone();
        updated.updated_at = Utc::now();
        shows.insert(show_id, updated);

        debug!("Updated show {}", show_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ShowArtist, ShowStatus, SetType, SourceMetadata, VenueArgs};

    fn venue(name: &str, city: &str) -> Venue {
        Venue::new(VenueArgs {
            name: name.to_string(),
            city: city.to_string(),
            state: "AZ".to_string(),
            address: None,
            verified: true,
        })
    }

    fn show(headliner_id: Uuid, venue_id: Uuid, day: NaiveDate) -> Show {
        Show {
            id: None,
            title: None,
            event_day: day,
            start_time: None,
            city: "Phoenix".to_string(),
            state: "AZ".to_string(),
            price: None,
            age_requirement: None,
            description: None,
            headliner_id,
            venue_ids: vec![venue_id],
            lineup: vec![ShowArtist {
                artist_id: headliner_id,
                position: 0,
                set_type: SetType::Headliner,
            }],
            source: None,
            status: ShowStatus::Approved,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_artist_lookup_is_case_insensitive() {
        let repo = InMemoryRepository::new();
        let mut artist = Artist::new("The National");
        repo.create_artist(&mut artist).await.unwrap();

        let found = repo.find_artist_by_name("the NATIONAL").await.unwrap();
        assert_eq!(found.and_then(|a| a.id), artist.id);
        assert!(repo.find_artist_by_name("National").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_venue_lookup_requires_city() {
        let repo = InMemoryRepository::new();
        let mut v = venue("Valley Bar", "Phoenix");
        repo.create_venue(&mut v).await.unwrap();

        assert!(repo
            .find_venue_by_name_and_city("valley bar", "phoenix")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_venue_by_name_and_city("Valley Bar", "Tempe")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_show_lookups() {
        let repo = InMemoryRepository::new();
        let headliner = Uuid::new_v4();
        let venue_id = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();

        let mut s = show(headliner, venue_id, day);
        s.source = Some(SourceMetadata {
            origin: "venuepilot".to_string(),
            source_event_id: "evt-1".to_string(),
        });
        repo.create_show(&mut s).await.unwrap();

        assert!(repo
            .find_show_by_headliner_venue_date(headliner, venue_id, day)
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_show_by_headliner_venue_date(headliner, venue_id, day.succ_opt().unwrap())
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_show_by_source_id("venuepilot", "evt-1")
            .await
            .unwrap()
            .is_some());
        assert_eq!(
            repo.find_shows_by_venue_and_date(venue_id, day).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_requires_existing_show() {
        let repo = InMemoryRepository::new();
        let mut s = show(Uuid::new_v4(), Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert!(repo.update_show(&s).await.is_err());

        s.id = Some(Uuid::new_v4());
        let err = repo.update_show(&s).await.unwrap_err();
        assert!(err.is_persistence());
    }
}

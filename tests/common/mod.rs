#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use sms_import::domain::{Artist, Show, Venue, VenueArgs};
use sms_import::storage::{InMemoryRepository, Repository};
use sms_import::{ImportError, RawInput, Result};

/// In-memory repository that counts mutating calls and can fail show writes
#[derive(Clone, Default)]
pub struct RecordingRepository {
    inner: InMemoryRepository,
    mutations: Arc<AtomicUsize>,
    fail_show_titles: Arc<Mutex<Vec<String>>>,
}

impl RecordingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Make `create_show` and `update_show` fail for shows with this title
    pub fn fail_shows_titled(&self, title: &str) {
        self.fail_show_titles.lock().unwrap().push(title.to_string());
    }

    fn check_show(&self, show: &Show) -> Result<()> {
        let failing = self.fail_show_titles.lock().unwrap();
        if show.title.as_ref().is_some_and(|t| failing.contains(t)) {
            return Err(ImportError::Persistence("connection reset by peer".to_string()));
        }
        Ok(())
    }

    pub async fn seed_artist(&self, name: &str) -> Uuid {
        let mut artist = Artist::new(name);
        self.inner.create_artist(&mut artist).await.unwrap();
        artist.id.unwrap()
    }

    pub async fn seed_venue(&self, name: &str, city: &str) -> Uuid {
        let mut venue = Venue::new(VenueArgs {
            name: name.to_string(),
            city: city.to_string(),
            state: "AZ".to_string(),
            address: None,
            verified: true,
        });
        self.inner.create_venue(&mut venue).await.unwrap();
        venue.id.unwrap()
    }

    pub async fn seed_show(&self, show: &mut Show) -> Uuid {
        self.inner.create_show(show).await.unwrap();
        show.id.unwrap()
    }
}

#[async_trait]
impl Repository for RecordingRepository {
    async fn find_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        self.inner.find_artist_by_name(name).await
    }

    async fn list_artists(&self) -> Result<Vec<Artist>> {
        self.inner.list_artists().await
    }

    async fn get_artist(&self, artist_id: Uuid) -> Result<Option<Artist>> {
        self.inner.get_artist(artist_id).await
    }

    async fn create_artist(&self, artist: &mut Artist) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.create_artist(artist).await
    }

    async fn find_venue_by_name_and_city(&self, name: &str, city: &str) -> Result<Option<Venue>> {
        self.inner.find_venue_by_name_and_city(name, city).await
    }

    async fn list_venues(&self) -> Result<Vec<Venue>> {
        self.inner.list_venues().await
    }

    async fn get_venue(&self, venue_id: Uuid) -> Result<Option<Venue>> {
        self.inner.get_venue(venue_id).await
    }

    async fn create_venue(&self, venue: &mut Venue) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.create_venue(venue).await
    }

    async fn find_show_by_headliner_venue_date(
        &self,
        headliner_id: Uuid,
        venue_id: Uuid,
        event_day: NaiveDate,
    ) -> Result<Option<Show>> {
        self.inner
            .find_show_by_headliner_venue_date(headliner_id, venue_id, event_day)
            .await
    }

    async fn find_show_by_source_id(
        &self,
        origin: &str,
        source_event_id: &str,
    ) -> Result<Option<Show>> {
        self.inner.find_show_by_source_id(origin, source_event_id).await
    }

    async fn find_shows_by_venue_and_date(
        &self,
        venue_id: Uuid,
        event_day: NaiveDate,
    ) -> Result<Vec<Show>> {
        self.inner.find_shows_by_venue_and_date(venue_id, event_day).await
    }

    async fn get_show(&self, show_id: Uuid) -> Result<Option<Show>> {
        self.inner.get_show(show_id).await
    }

    async fn list_shows(&self) -> Result<Vec<Show>> {
        self.inner.list_shows().await
    }

    async fn create_show(&self, show: &mut Show) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check_show(show)?;
        self.inner.create_show(show).await
    }

    async fn update_show(&self, show: &Show) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check_show(show)?;
        self.inner.update_show(show).await
    }
}

/// Export document for a user-submitted show
pub fn export_doc(title: &str, headliner: &str, venue: &str, city: &str, date: &str) -> RawInput {
    RawInput::Export(format!(
        r#"+++
schema_version = "1.0"

[show]
title = "{title}"
date = "{date}"
city = "{city}"
state = "AZ"

[[venues]]
name = "{venue}"
city = "{city}"
state = "AZ"

[[artists]]
name = "{headliner}"
position = 0
set_type = "headliner"
+++
"#
    ))
}

/// Export document listing several venues, in order
pub fn export_doc_with_venues(title: &str, headliner: &str, venues: &[(&str, &str)], date: &str) -> RawInput {
    let venue_tables: String = venues
        .iter()
        .map(|(name, city)| format!("[[venues]]\nname = \"{name}\"\ncity = \"{city}\"\nstate = \"AZ\"\n\n"))
        .collect();
    RawInput::Export(format!(
        r#"+++
schema_version = "1.0"

[show]
title = "{title}"
date = "{date}"
state = "AZ"

{venue_tables}[[artists]]
name = "{headliner}"
position = 0
set_type = "headliner"
+++
"#
    ))
}

/// Discovery record for an automatically found show
pub fn discovery(source_event_id: &str, artists: &[&str], venue: &str, date: &str) -> Value {
    json!({
        "source": "venuepilot",
        "source_event_id": source_event_id,
        "date": date,
        "venue_name": venue,
        "venue_city": "Phoenix",
        "venue_state": "AZ",
        "artists": artists,
    })
}

pub fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

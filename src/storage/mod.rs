pub mod in_memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{Artist, Show, Venue};
use crate::error::Result;

pub use in_memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

/// Catalog repository the import engine reads from and writes to.
///
/// Lookups by name are case-insensitive. Each create/update is atomic for the
/// row and its associations; the engine runs no transactions of its own.
#[async_trait]
pub trait Repository: Send + Sync {
    // Artist operations
    async fn find_artist_by_name(&self, name: &str) -> Result<Option<Artist>>;
    async fn list_artists(&self) -> Result<Vec<Artist>>;
    async fn get_artist(&self, artist_id: Uuid) -> Result<Option<Artist>>;
    async fn create_artist(&self, artist: &mut Artist) -> Result<()>;

    // Venue operations
    async fn find_venue_by_name_and_city(&self, name: &str, city: &str) -> Result<Option<Venue>>;
    async fn list_venues(&self) -> Result<Vec<Venue>>;
    async fn get_venue(&self, venue_id: Uuid) -> Result<Option<Venue>>;
    async fn create_venue(&self, venue: &mut Venue) -> Result<()>;

    // Show operations
    async fn find_show_by_headliner_venue_date(
        &self,
        headliner_id: Uuid,
        venue_id: Uuid,
        event_day: NaiveDate,
    ) -> Result<Option<Show>>;
    async fn find_show_by_source_id(
        &self,
        origin: &str,
        source_event_id: &str,
    ) -> Result<Option<Show>>;
    async fn find_shows_by_venue_and_date(
        &self,
        venue_id: Uuid,
        event_day: NaiveDate,
    ) -> Result<Vec<Show>>;
    async fn get_show(&self, show_id: Uuid) -> Result<Option<Show>>;
    async fn list_shows(&self) -> Result<Vec<Show>>;
    async fn create_show(&self, show: &mut Show) -> Result<()>;
    async fn update_show(&self, show: &Show) -> Result<()>;
}

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::Repository;
use crate::domain::{Artist, SetType, Show, ShowArtist, ShowStatus, SourceMetadata, Venue};
use crate::error::{ImportError, Result};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys=ON;
    CREATE TABLE IF NOT EXISTS artists (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        name_lower  TEXT NOT NULL UNIQUE,
        name_slug   TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS venues (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        name_lower  TEXT NOT NULL,
        slug        TEXT NOT NULL,
        city        TEXT NOT NULL,
        city_lower  TEXT NOT NULL,
        state       TEXT NOT NULL,
        address     TEXT,
        verified    INTEGER NOT NULL,
        created_at  TEXT NOT NULL,
        UNIQUE (name_lower, city_lower)
    );
    CREATE TABLE IF NOT EXISTS shows (
        id               TEXT PRIMARY KEY,
        title            TEXT,
        event_day        TEXT NOT NULL,
        start_time       TEXT,
        city             TEXT NOT NULL,
        state            TEXT NOT NULL,
        price            TEXT,
        age_requirement  TEXT,
        description      TEXT,
        headliner_id     TEXT NOT NULL REFERENCES artists(id),
        venue_id         TEXT NOT NULL REFERENCES venues(id),
        source_origin    TEXT,
        source_event_id  TEXT,
        status           TEXT NOT NULL,
        created_at       TEXT NOT NULL,
        updated_at       TEXT NOT NULL,
        UNIQUE (source_origin, source_event_id)
    );
    CREATE INDEX IF NOT EXISTS shows_venue_day ON shows (venue_id, event_day);
    CREATE TABLE IF NOT EXISTS show_artists (
        show_id    TEXT NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
        artist_id  TEXT NOT NULL REFERENCES artists(id),
        position   INTEGER NOT NULL,
        set_type   TEXT NOT NULL,
        PRIMARY KEY (show_id, artist_id)
    );
    CREATE TABLE IF NOT EXISTS show_venues (
        show_id   TEXT NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
        venue_id  TEXT NOT NULL REFERENCES venues(id),
        position  INTEGER NOT NULL,
        PRIMARY KEY (show_id, venue_id)
    );
"#;

const SHOW_COLUMNS: &str = "id, title, event_day, start_time, city, state, price, age_requirement, \
     description, headliner_id, source_origin, source_event_id, status, created_at, updated_at";

/// SQLite-backed catalog repository
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ImportError::Persistence("sqlite connection lock poisoned".to_string()))
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| ImportError::Persistence(format!("corrupt id '{}': {}", value, e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ImportError::Persistence(format!("corrupt timestamp '{}': {}", value, e)))
}

fn parse_day(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| ImportError::Persistence(format!("corrupt date '{}': {}", value, e)))
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .map_err(|e| ImportError::Persistence(format!("corrupt time '{}': {}", value, e)))
}

struct ArtistRow {
    id: String,
    name: String,
    name_slug: String,
    created_at: String,
}

impl ArtistRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            name_slug: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn into_artist(self) -> Result<Artist> {
        Ok(Artist {
            id: Some(parse_uuid(&self.id)?),
            name: self.name,
            name_slug: self.name_slug,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

struct VenueRow {
    id: String,
    name: String,
    name_lower: String,
    slug: String,
    city: String,
    state: String,
    address: Option<String>,
    verified: bool,
    created_at: String,
}

impl VenueRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            name_lower: row.get(2)?,
            slug: row.get(3)?,
            city: row.get(4)?,
            state: row.get(5)?,
            address: row.get(6)?,
            verified: row.get::<_, i64>(7)? != 0,
            created_at: row.get(8)?,
        })
    }

    fn into_venue(self) -> Result<Venue> {
        Ok(Venue {
            id: Some(parse_uuid(&self.id)?),
            name: self.name,
            name_lower: self.name_lower,
            slug: self.slug,
            city: self.city,
            state: self.state,
            address: self.address,
            verified: self.verified,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

const VENUE_COLUMNS: &str =
    "id, name, name_lower, slug, city, state, address, verified, created_at";

struct ShowRow {
    id: String,
    title: Option<String>,
    event_day: String,
    start_time: Option<String>,
    city: String,
    state: String,
    price: Option<String>,
    age_requirement: Option<String>,
    description: Option<String>,
    headliner_id: String,
    source_origin: Option<String>,
    source_event_id: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl ShowRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            event_day: row.get(2)?,
            start_time: row.get(3)?,
            city: row.get(4)?,
            state: row.get(5)?,
            price: row.get(6)?,
            age_requirement: row.get(7)?,
            description: row.get(8)?,
            headliner_id: row.get(9)?,
            source_origin: row.get(10)?,
            source_event_id: row.get(11)?,
            status: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

/// Hydrate show rows with their lineup and venue associations
fn load_shows(conn: &Connection, rows: Vec<ShowRow>) -> Result<Vec<Show>> {
    let mut lineup_stmt = conn.prepare(
        "SELECT artist_id, position, set_type FROM show_artists WHERE show_id = ?1 ORDER BY position",
    )?;
    let mut venue_stmt =
        conn.prepare("SELECT venue_id FROM show_venues WHERE show_id = ?1 ORDER BY position")?;

    let mut shows = Vec::with_capacity(rows.len());
    for row in rows {
        let lineup_rows = lineup_stmt
            .query_map(params![row.id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?, r.get::<_, String>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut lineup = Vec::with_capacity(lineup_rows.len());
        for (artist_id, position, set_type) in lineup_rows {
            lineup.push(ShowArtist {
                artist_id: parse_uuid(&artist_id)?,
                position: position as u32,
                set_type: set_type
                    .parse::<SetType>()
                    .map_err(|e| ImportError::Persistence(e.reason()))?,
            });
        }

        let venue_ids = venue_stmt
            .query_map(params![row.id], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .iter()
            .map(|id| parse_uuid(id))
            .collect::<Result<Vec<_>>>()?;

        let source = match (row.source_origin, row.source_event_id) {
            (Some(origin), Some(source_event_id)) => Some(SourceMetadata {
                origin,
                source_event_id,
            }),
            _ => None,
        };

        shows.push(Show {
            id: Some(parse_uuid(&row.id)?),
            title: row.title,
            event_day: parse_day(&row.event_day)?,
            start_time: row.start_time.as_deref().map(parse_time).transpose()?,
            city: row.city,
            state: row.state,
            price: row.price,
            age_requirement: row.age_requirement,
            description: row.description,
            headliner_id: parse_uuid(&row.headliner_id)?,
            venue_ids,
            lineup,
            source,
            status: ShowStatus::parse(&row.status).ok_or_else(|| {
                ImportError::Persistence(format!("corrupt show status '{}'", row.status))
            })?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        });
    }
    Ok(shows)
}

fn query_shows(conn: &Connection, where_clause: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Show>> {
    let sql = format!(
        "SELECT {} FROM shows {} ORDER BY event_day, created_at",
        SHOW_COLUMNS, where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(args, ShowRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    load_shows(conn, rows)
}

/// Replace a show's lineup and venue associations inside an open transaction
fn write_associations(tx: &rusqlite::Transaction<'_>, show_id: &str, show: &Show) -> Result<()> {
    tx.execute("DELETE FROM show_artists WHERE show_id = ?1", params![show_id])?;
    tx.execute("DELETE FROM show_venues WHERE show_id = ?1", params![show_id])?;
    for entry in &show.lineup {
        tx.execute(
            "INSERT INTO show_artists (show_id, artist_id, position, set_type) VALUES (?1, ?2, ?3, ?4)",
            params![
                show_id,
                entry.artist_id.to_string(),
                entry.position as i64,
                entry.set_type.as_str()
            ],
        )?;
    }
    for (position, venue_id) in show.venue_ids.iter().enumerate() {
        tx.execute(
            "INSERT INTO show_venues (show_id, venue_id, position) VALUES (?1, ?2, ?3)",
            params![show_id, venue_id.to_string(), position as i64],
        )?;
    }
    Ok(())
}

fn primary_venue(show: &Show) -> Result<String> {
    show.primary_venue_id()
        .map(|id| id.to_string())
        .ok_or_else(|| ImportError::Persistence("show has no venue".to_string()))
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn find_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name, name_slug, created_at FROM artists WHERE name_lower = ?1",
                params![name.trim().to_lowercase()],
                ArtistRow::from_row,
            )
            .optional()?;
        row.map(ArtistRow::into_artist).transpose()
    }

    async fn list_artists(&self) -> Result<Vec<Artist>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, name_slug, created_at FROM artists ORDER BY name_lower")?;
        let rows = stmt
            .query_map([], ArtistRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ArtistRow::into_artist).collect()
    }

    async fn get_artist(&self, artist_id: Uuid) -> Result<Option<Artist>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name, name_slug, created_at FROM artists WHERE id = ?1",
                params![artist_id.to_string()],
                ArtistRow::from_row,
            )
            .optional()?;
        row.map(ArtistRow::into_artist).transpose()
    }

    async fn create_artist(&self, artist: &mut Artist) -> Result<()> {
        let id = Uuid::new_v4();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO artists (id, name, name_lower, name_slug, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                artist.name,
                artist.name.to_lowercase(),
                artist.name_slug,
                artist.created_at.to_rfc3339()
            ],
        )?;
        artist.id = Some(id);
        debug!("Created artist: {} with id {}", artist.name, id);
        Ok(())
    }

    async fn find_venue_by_name_and_city(&self, name: &str, city: &str) -> Result<Option<Venue>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM venues WHERE name_lower = ?1 AND city_lower = ?2",
            VENUE_COLUMNS
        );
        let row = conn
            .query_row(
                &sql,
                params![name.trim().to_lowercase(), city.trim().to_lowercase()],
                VenueRow::from_row,
            )
            .optional()?;
        row.map(VenueRow::into_venue).transpose()
    }

    async fn list_venues(&self) -> Result<Vec<Venue>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM venues ORDER BY name_lower, city_lower", VENUE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], VenueRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(VenueRow::into_venue).collect()
    }

    async fn get_venue(&self, venue_id: Uuid) -> Result<Option<Venue>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM venues WHERE id = ?1", VENUE_COLUMNS);
        let row = conn
            .query_row(&sql, params![venue_id.to_string()], VenueRow::from_row)
            .optional()?;
        row.map(VenueRow::into_venue).transpose()
    }

    async fn create_venue(&self, venue: &mut Venue) -> Result<()> {
        let id = Uuid::new_v4();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO venues (id, name, name_lower, slug, city, city_lower, state, address, verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id.to_string(),
                venue.name,
                venue.name_lower,
                venue.slug,
                venue.city,
                venue.city.to_lowercase(),
                venue.state,
                venue.address,
                venue.verified as i64,
                venue.created_at.to_rfc3339()
            ],
        )?;
        venue.id = Some(id);
        debug!("Created venue: {} ({}) with id {}", venue.name, venue.city, id);
        Ok(())
    }

    async fn find_show_by_headliner_venue_date(
        &self,
        headliner_id: Uuid,
        venue_id: Uuid,
        event_day: NaiveDate,
    ) -> Result<Option<Show>> {
        let conn = self.conn()?;
        let shows = query_shows(
            &conn,
            "WHERE headliner_id = ?1 AND venue_id = ?2 AND event_day = ?3",
            &[
                &headliner_id.to_string(),
                &venue_id.to_string(),
                &event_day.to_string(),
            ],
        )?;
        Ok(shows.into_iter().next())
    }

    async fn find_show_by_source_id(
        &self,
        origin: &str,
        source_event_id: &str,
    ) -> Result<Option<Show>> {
        let conn = self.conn()?;
        let shows = query_shows(
            &conn,
            "WHERE source_origin = ?1 AND source_event_id = ?2",
            &[&origin, &source_event_id],
        )?;
        Ok(shows.into_iter().next())
    }

    async fn find_shows_by_venue_and_date(
        &self,
        venue_id: Uuid,
        event_day: NaiveDate,
    ) -> Result<Vec<Show>> {
        let conn = self.conn()?;
        query_shows(
            &conn,
            "WHERE event_day = ?2 AND id IN (SELECT show_id FROM show_venues WHERE venue_id = ?1)",
            &[&venue_id.to_string(), &event_day.to_string()],
        )
    }

    async fn get_show(&self, show_id: Uuid) -> Result<Option<Show>> {
        let conn = self.conn()?;
        let shows = query_shows(&conn, "WHERE id = ?1", &[&show_id.to_string()])?;
        Ok(shows.into_iter().next())
    }

    async fn list_shows(&self) -> Result<Vec<Show>> {
        let conn = self.conn()?;
        query_shows(&conn, "", &[])
    }

    async fn create_show(&self, show: &mut Show) -> Result<()> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let venue_id = primary_venue(show)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO shows (id, title, event_day, start_time, city, state, price, age_requirement,
                description, headliner_id, venue_id, source_origin, source_event_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                id_str,
                show.title,
                show.event_day.to_string(),
                show.start_time.map(|t| t.format("%H:%M:%S").to_string()),
                show.city,
                show.state,
                show.price,
                show.age_requirement,
                show.description,
                show.headliner_id.to_string(),
                venue_id,
                show.source.as_ref().map(|s| s.origin.clone()),
                show.source.as_ref().map(|s| s.source_event_id.clone()),
                show.status.as_str(),
                show.created_at.to_rfc3339(),
                show.updated_at.to_rfc3339()
            ],
        )?;
        write_associations(&tx, &id_str, show)?;
        tx.commit()?;

        show.id = Some(id);
        debug!("Created show {} on {}", id, show.event_day);
        Ok(())
    }

    async fn update_show(&self, show: &Show) -> Result<()> {
        let show_id = show
            .id
            .ok_or_else(|| ImportError::Persistence("Cannot update show without ID".to_string()))?;
        let id_str = show_id.to_string();
        let venue_id = primary_venue(show)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE shows SET title = ?2, event_day = ?3, start_time = ?4, city = ?5, state = ?6, price = ?7,
                age_requirement = ?8, description = ?9, headliner_id = ?10, venue_id = ?11,
                source_origin = ?12, source_event_id = ?13, status = ?14, updated_at = ?15
             WHERE id = ?1",
            params![
                id_str,
                show.title,
                show.event_day.to_string(),
                show.start_time.map(|t| t.format("%H:%M:%S").to_string()),
                show.city,
                show.state,
                show.price,
                show.age_requirement,
                show.description,
                show.headliner_id.to_string(),
                venue_id,
                show.source.as_ref().map(|s| s.origin.clone()),
                show.source.as_ref().map(|s| s.source_event_id.clone()),
                show.status.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        if changed == 0 {
            return Err(ImportError::Persistence(format!("Show {} does not exist", show_id)));
        }
        write_associations(&tx, &id_str, show)?;
        tx.commit()?;

        debug!("Updated show {}", show_id);
        Ok(())
    }
}

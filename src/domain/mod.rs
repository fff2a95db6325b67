use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ImportError;

/// How an artist is billed on a show
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SetType {
    Headliner,
    Opener,
    #[default]
    Performer,
}

impl SetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetType::Headliner => "headliner",
            SetType::Opener => "opener",
            SetType::Performer => "performer",
        }
    }
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SetType {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "headliner" | "headline" => Ok(SetType::Headliner),
            "opener" | "support" => Ok(SetType::Opener),
            "performer" | "" => Ok(SetType::Performer),
            other => Err(ImportError::Parse(format!("unknown set type '{}'", other))),
        }
    }
}

/// Origin tag plus stable external identifier of an automatically discovered event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceMetadata {
    pub origin: String,
    pub source_event_id: String,
}

/// An artist in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artist {
    pub id: Option<Uuid>,
    pub name: String,
    pub name_slug: String,
    pub created_at: DateTime<Utc>,
}

impl Artist {
    /// Create a new, unsaved artist with generated derived fields
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_string();
        Self {
            id: None,
            name_slug: slugify(&name),
            name,
            created_at: Utc::now(),
        }
    }
}

/// A venue in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Venue {
    pub id: Option<Uuid>,
    pub name: String,
    pub name_lower: String,
    pub slug: String,
    pub city: String,
    pub state: String,
    pub address: Option<String>,
    /// Unverified venues await moderation before being shown publicly
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Arguments for creating a venue
#[derive(Debug, Clone)]
pub struct VenueArgs {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: Option<String>,
    pub verified: bool,
}

impl Venue {
    /// Create a new, unsaved venue with generated derived fields
    pub fn new(args: VenueArgs) -> Self {
        let name = args.name.trim().to_string();
        Self {
            id: None,
            name_lower: name.to_lowercase(),
            slug: slugify(&name),
            name,
            city: args.city.trim().to_string(),
            state: args.state.trim().to_string(),
            address: args.address,
            verified: args.verified,
            created_at: Utc::now(),
        }
    }
}

/// Moderation state of a persisted show
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShowStatus {
    Approved,
    Pending,
}

impl ShowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShowStatus::Approved => "approved",
            ShowStatus::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(ShowStatus::Approved),
            "pending" => Some(ShowStatus::Pending),
            _ => None,
        }
    }
}

/// One billed artist on a persisted show
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowArtist {
    pub artist_id: Uuid,
    pub position: u32,
    pub set_type: SetType,
}

/// A show in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Show {
    pub id: Option<Uuid>,
    pub title: Option<String>,
    pub event_day: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub city: String,
    pub state: String,
    pub price: Option<String>,
    pub age_requirement: Option<String>,
    pub description: Option<String>,
    pub headliner_id: Uuid,
    /// Venue associations, primary venue first
    pub venue_ids: Vec<Uuid>,
    pub lineup: Vec<ShowArtist>,
    pub source: Option<SourceMetadata>,
    pub status: ShowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Show {
    pub fn primary_venue_id(&self) -> Option<Uuid> {
        self.venue_ids.first().copied()
    }
}

/// Lowercase, hyphen-separated slug of a display name
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

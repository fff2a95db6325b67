use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{slugify, Show};
use crate::error::{ImportError, Result};
use crate::pipeline::processing::normalize::export::{record_from_catalog, render_document};
use crate::storage::Repository;

/// One rendered export document
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub show_id: Uuid,
    pub file_name: String,
    pub content: String,
}

/// Use case for exporting catalog shows as documents another deployment can import
pub struct ExportUseCase {
    repo: Arc<dyn Repository>,
}

impl ExportUseCase {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Render every show in the catalog
    pub async fn export_all(&self, exported_at: DateTime<Utc>) -> Result<Vec<ExportedDocument>> {
        let shows = self.repo.list_shows().await?;
        let artists = self.repo.list_artists().await?;
        let venues = self.repo.list_venues().await?;

        let mut documents = Vec::with_capacity(shows.len());
        for show in &shows {
            let record = record_from_catalog(show, &artists, &venues)?;
            let content = render_document(&record, exported_at)?;
            documents.push(ExportedDocument {
                show_id: show_id(show)?,
                file_name: file_name(show, &record.label()),
                content,
            });
        }
        info!("Rendered {} export documents", documents.len());
        Ok(documents)
    }

    /// Render a single show
    pub async fn export_show(&self, id: Uuid, exported_at: DateTime<Utc>) -> Result<ExportedDocument> {
        let show = self
            .repo
            .get_show(id)
            .await?
            .ok_or_else(|| ImportError::Validation(format!("show {} does not exist", id)))?;

        let mut artists = Vec::with_capacity(show.lineup.len());
        for entry in &show.lineup {
            if let Some(artist) = self.repo.get_artist(entry.artist_id).await? {
                artists.push(artist);
            }
        }
        let mut venues = Vec::with_capacity(show.venue_ids.len());
        for venue_id in &show.venue_ids {
            if let Some(venue) = self.repo.get_venue(*venue_id).await? {
                venues.push(venue);
            }
        }

        let record = record_from_catalog(&show, &artists, &venues)?;
        Ok(ExportedDocument {
            show_id: id,
            file_name: file_name(&show, &record.label()),
            content: render_document(&record, exported_at)?,
        })
    }

    /// Write documents into `dir`, returning the paths written
    pub fn write_all(documents: &[ExportedDocument], dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(documents.len());
        for doc in documents {
            let path = dir.join(&doc.file_name);
            fs::write(&path, &doc.content)?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn show_id(show: &Show) -> Result<Uuid> {
    show.id
        .ok_or_else(|| ImportError::Persistence("stored show has no id".to_string()))
}

/// `2026-03-20-the-national-valley-bar-1a2b3c4d.md`; the id suffix keeps names unique
fn file_name(show: &Show, label: &str) -> String {
    let id = show.id.map(|id| id.simple().to_string()).unwrap_or_default();
    let short = &id[..id.len().min(8)];
    let stem = slugify(label.split(" (").next().unwrap_or(label).replace('@', " ").as_str());
    format!("{}-{}-{}.md", show.event_day, stem, short)
}

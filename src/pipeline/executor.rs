use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{Config, ImportConfig, MatchingConfig};
use crate::domain::{Artist, Show, ShowArtist, ShowStatus, Venue, VenueArgs};
use crate::error::{ImportError, Result};
use crate::metrics::ImportMetrics;
use crate::pipeline::processing::batch::{artist_key, placeholder_id, BatchCache, PlannedShow};
use crate::pipeline::processing::conflict::{
    ConflictDetector, Detection, ExistingShow, OutcomeHint, RecordMatches, ShowContext,
};
use crate::pipeline::processing::matching::{EntityMatcher, MatchResult};
use crate::pipeline::processing::normalize::{self, RawInput, ShowRecord};
use crate::pipeline::processing::report::{
    aggregate, render_message, render_unlabelled_error, EntityMatch, ImportOutcome, ImportReport,
    ImportResultEntry, Mode,
};
use crate::storage::Repository;

/// Per-invocation options
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Reference date for past-show checks
    pub today: NaiveDate,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }
}

/// Published once per record of a Commit batch
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeEvent {
    pub index: usize,
    pub outcome: ImportOutcome,
    pub message: String,
    pub show_id: Option<Uuid>,
    pub privileged: bool,
}

/// Runs normalize, match, detect and write for every record of a batch.
///
/// Preview and Commit share every step except the final write: Preview plans
/// placeholder identifiers into the batch cache where Commit creates rows and
/// caches the real identifiers.
pub struct ReconciliationExecutor {
    repo: Arc<dyn Repository>,
    matching: MatchingConfig,
    import: ImportConfig,
    events: Option<broadcast::Sender<OutcomeEvent>>,
}

impl ReconciliationExecutor {
    pub fn new(repo: Arc<dyn Repository>, config: &Config) -> Self {
        Self {
            repo,
            matching: config.matching.clone(),
            import: config.import.clone(),
            events: None,
        }
    }

    pub fn with_events(mut self, sender: broadcast::Sender<OutcomeEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Process a batch sequentially, one outcome per input in input order
    #[instrument(skip(self, inputs, options, mode), fields(mode = %mode, records = inputs.len()))]
    pub async fn run(&self, inputs: &[RawInput], mode: Mode, options: &ImportOptions) -> ImportReport {
        let started = Instant::now();
        info!("Starting {} batch of {} records", mode, inputs.len());

        let mut cache = BatchCache::new();
        let mut entries = Vec::with_capacity(inputs.len());
        for (index, raw) in inputs.iter().enumerate() {
            let entry = self.process_record(index, raw, mode, options, &mut cache).await;
            debug!("Record {}: {}", index, entry.message);
            ImportMetrics::record_outcome(mode.as_str(), entry.outcome.kind());
            if let Mode::Commit { privileged } = mode {
                self.publish(&entry, privileged);
            }
            entries.push(entry);
        }

        let report = aggregate(mode, entries);
        ImportMetrics::record_batch(mode.as_str(), inputs.len(), started.elapsed().as_secs_f64());
        info!(
            "Finished {} batch: {} imported, {} updated, {} duplicates, {} rejected, {} for review, {} errors, {} skipped",
            mode,
            report.summary.imported,
            report.summary.updated,
            report.summary.duplicates,
            report.summary.rejected,
            report.summary.pending_review,
            report.summary.errors,
            report.summary.skipped
        );
        report
    }

    async fn process_record(
        &self,
        index: usize,
        raw: &RawInput,
        mode: Mode,
        options: &ImportOptions,
        cache: &mut BatchCache,
    ) -> ImportResultEntry {
        let record = match normalize::parse(raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("Record {} could not be normalized: {}", index, e);
                let reason = e.reason();
                return ImportResultEntry {
                    index,
                    message: render_unlabelled_error(&reason),
                    outcome: ImportOutcome::Error(reason),
                    matched_artists: Vec::new(),
                    matched_venue: None,
                    warnings: Vec::new(),
                    show_id: None,
                };
            }
        };
        let label = record.label();

        let mut entry = ImportResultEntry {
            index,
            outcome: ImportOutcome::Imported,
            message: String::new(),
            matched_artists: Vec::new(),
            matched_venue: None,
            warnings: Vec::new(),
            show_id: None,
        };

        if let Some(status) = self.skip_status(&record) {
            debug!("Skipping {}: listing status '{}'", label, status);
            entry.outcome = ImportOutcome::Skipped(format!("listing is {}", status));
            entry.message = render_message(&entry.outcome, Some(&label), mode);
            return entry;
        }

        let (matches, detection) = match self.classify(&record, options, cache).await {
            Ok(classified) => classified,
            Err(e) => {
                self.log_failure(&label, &e);
                entry.outcome = ImportOutcome::Error(e.reason());
                entry.message = render_message(&entry.outcome, Some(&label), mode);
                return entry;
            }
        };
        entry.matched_artists = record
            .artists
            .iter()
            .zip(&matches.artists)
            .map(|(artist, result)| EntityMatch {
                name: artist.name.clone(),
                city: None,
                result: result.clone(),
            })
            .collect();
        entry.matched_venue = record
            .primary_venue()
            .zip(matches.venues.first())
            .map(|(venue, result)| EntityMatch {
                name: venue.name.clone(),
                city: Some(venue.city.clone()),
                result: result.clone(),
            });
        entry.warnings = detection.warnings;

        let (outcome, show_id) = match detection.hint {
            OutcomeHint::Error(reason) => (ImportOutcome::Error(reason), None),
            OutcomeHint::Duplicate { existing } => (ImportOutcome::Duplicate, Some(existing)),
            OutcomeHint::Reject(reason) => (ImportOutcome::Rejected(reason), None),
            OutcomeHint::Review(reason) => (ImportOutcome::FlaggedForReview(reason), None),
            OutcomeHint::Ready { update_of } => {
                let written = match mode {
                    Mode::Preview => Ok(self.plan(&record, &matches, update_of, cache)),
                    Mode::Commit { privileged } => {
                        self.write(&record, &matches, update_of, privileged, cache).await
                    }
                };
                match written {
                    Ok(id) if update_of.is_some() => (ImportOutcome::Updated, Some(id)),
                    Ok(id) => (ImportOutcome::Imported, Some(id)),
                    Err(e) => {
                        self.log_failure(&label, &e);
                        (ImportOutcome::Error(e.reason()), None)
                    }
                }
            }
        };

        entry.message = render_message(&outcome, Some(&label), mode);
        entry.outcome = outcome;
        entry.show_id = show_id;
        entry
    }

    fn skip_status<'r>(&self, record: &'r ShowRecord) -> Option<&'r str> {
        let status = record.source_status.as_deref()?;
        self.import
            .skip_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status))
            .then_some(status)
    }

    fn log_failure(&self, label: &str, e: &ImportError) {
        if e.is_persistence() {
            error!("Persistence failure for {}: {}", label, e);
            ImportMetrics::record_persistence_failure();
        } else {
            warn!("Failed to reconcile {}: {}", label, e);
        }
    }

    /// Read-only half of the pipeline, identical in both modes
    async fn classify(
        &self,
        record: &ShowRecord,
        options: &ImportOptions,
        cache: &BatchCache,
    ) -> Result<(RecordMatches, Detection)> {
        let matcher = EntityMatcher::new(self.repo.as_ref(), cache, &self.matching);
        let mut artists = Vec::with_capacity(record.artists.len());
        for artist in &record.artists {
            artists.push(matcher.match_artist(artist).await?);
        }
        let mut venues = Vec::with_capacity(record.venues.len());
        for venue in &record.venues {
            venues.push(matcher.match_venue(venue).await?);
        }
        let matches = RecordMatches { artists, venues };

        let context = self.show_context(record, &matches, cache).await?;
        let detection = ConflictDetector::new(self.import.reject_past_shows, options.today)
            .detect(record, &matches, &context);
        Ok((matches, detection))
    }

    /// Gather the shows a record could collide with, batch cache first
    async fn show_context(
        &self,
        record: &ShowRecord,
        matches: &RecordMatches,
        cache: &BatchCache,
    ) -> Result<ShowContext> {
        let mut context = ShowContext::default();

        if let Some(source) = &record.source {
            context.by_source = match cache.show_by_source(source) {
                Some(planned) => Some(from_planned(planned)),
                None => match self
                    .repo
                    .find_show_by_source_id(&source.origin, &source.source_event_id)
                    .await?
                {
                    Some(show) => Some(self.describe(&show).await?),
                    None => None,
                },
            };
        }

        let headliner_id = record
            .headliner_index()
            .and_then(|i| matches.artists.get(i))
            .and_then(MatchResult::matched_id);
        let Some(venue_id) = matches.venues.first().and_then(MatchResult::matched_id) else {
            return Ok(context);
        };
        let day = record.event_day;

        if let Some(headliner_id) = headliner_id {
            context.by_key = match cache.show_by_headliner_venue_date(headliner_id, venue_id, day) {
                Some(planned) => Some(from_planned(planned)),
                None => match self
                    .repo
                    .find_show_by_headliner_venue_date(headliner_id, venue_id, day)
                    .await?
                {
                    // A show this batch already rewrote is represented by its cached state
                    Some(show) if show.id.is_some_and(|id| !cache.has_show(id)) => {
                        Some(self.describe(&show).await?)
                    }
                    _ => None,
                },
            };
        }

        let mut seen = HashSet::new();
        for planned in cache.shows_at(venue_id, day) {
            seen.insert(planned.id);
            context.same_day.push(from_planned(planned));
        }
        for show in self.repo.find_shows_by_venue_and_date(venue_id, day).await? {
            let Some(id) = show.id else { continue };
            if seen.insert(id) && !cache.has_show(id) {
                context.same_day.push(self.describe(&show).await?);
            }
        }

        Ok(context)
    }

    async fn describe(&self, show: &Show) -> Result<ExistingShow> {
        let id = show
            .id
            .ok_or_else(|| ImportError::Persistence("stored show has no id".to_string()))?;
        let headliner = self
            .repo
            .get_artist(show.headliner_id)
            .await?
            .map(|a| a.name)
            .unwrap_or_else(|| "unknown artist".to_string());
        let venue = match show.primary_venue_id() {
            Some(venue_id) => self.repo.get_venue(venue_id).await?.map(|v| v.name),
            None => None,
        }
        .unwrap_or_else(|| "unknown venue".to_string());

        Ok(ExistingShow {
            id,
            headliner_id: show.headliner_id,
            label: format!("{} @ {} ({})", headliner, venue, show.event_day),
        })
    }

    /// Preview: assign placeholder identifiers and record the plan
    fn plan(
        &self,
        record: &ShowRecord,
        matches: &RecordMatches,
        update_of: Option<Uuid>,
        cache: &mut BatchCache,
    ) -> Uuid {
        let mut artist_ids = Vec::with_capacity(record.artists.len());
        for (artist, result) in record.artists.iter().zip(&matches.artists) {
            let id = match result
                .matched_id()
                .or_else(|| cache.artist(&artist.name).map(|c| c.id))
            {
                Some(id) => id,
                None => {
                    let id = placeholder_id("artist", &artist_key(&artist.name));
                    cache.remember_artist(&artist.name, id);
                    id
                }
            };
            artist_ids.push(id);
        }

        let mut venue_ids = Vec::with_capacity(record.venues.len());
        for (venue, result) in record.venues.iter().zip(&matches.venues) {
            let id = match result
                .matched_id()
                .or_else(|| cache.venue(&venue.name, &venue.city).map(|c| c.id))
            {
                Some(id) => id,
                None => {
                    let key = format!("{}|{}", venue.name.to_lowercase(), venue.city.to_lowercase());
                    let id = placeholder_id("venue", &key);
                    cache.remember_venue(&venue.name, &venue.city, id);
                    id
                }
            };
            venue_ids.push(id);
        }

        let show_id = update_of.unwrap_or_else(|| {
            let key = match &record.source {
                Some(source) => format!("{}:{}", source.origin, source.source_event_id),
                None => record.label(),
            };
            placeholder_id("show", &key)
        });
        let headliner_id = headliner_of(record, &artist_ids);
        cache.remember_show(PlannedShow {
            id: show_id,
            headliner_id,
            venue_ids,
            event_day: record.event_day,
            label: record.label(),
            source: record.source.clone(),
        });
        debug!("Planned show {} for {}", show_id, record.label());
        show_id
    }

    /// Commit: create new artists, then new venues, then create or update the show
    async fn write(
        &self,
        record: &ShowRecord,
        matches: &RecordMatches,
        update_of: Option<Uuid>,
        privileged: bool,
        cache: &mut BatchCache,
    ) -> Result<Uuid> {
        let mut artist_ids = Vec::with_capacity(record.artists.len());
        for (artist_ref, result) in record.artists.iter().zip(&matches.artists) {
            let id = match result
                .matched_id()
                .or_else(|| cache.artist(&artist_ref.name).map(|c| c.id))
            {
                Some(id) => id,
                None => {
                    let mut artist = Artist::new(&artist_ref.name);
                    self.repo.create_artist(&mut artist).await?;
                    let id = artist.id.ok_or_else(|| {
                        ImportError::Persistence(format!("artist '{}' stored without id", artist.name))
                    })?;
                    cache.remember_artist(&artist_ref.name, id);
                    ImportMetrics::record_entity_created("artist");
                    info!("Created artist '{}' ({})", artist.name, id);
                    id
                }
            };
            artist_ids.push(id);
        }

        let mut venue_ids = Vec::with_capacity(record.venues.len());
        for (venue_ref, result) in record.venues.iter().zip(&matches.venues) {
            let id = match result
                .matched_id()
                .or_else(|| cache.venue(&venue_ref.name, &venue_ref.city).map(|c| c.id))
            {
                Some(id) => id,
                None => {
                    let mut venue = Venue::new(VenueArgs {
                        name: venue_ref.name.clone(),
                        city: venue_ref.city.clone(),
                        state: venue_ref.state.clone(),
                        address: venue_ref.address.clone(),
                        verified: privileged,
                    });
                    self.repo.create_venue(&mut venue).await?;
                    let id = venue.id.ok_or_else(|| {
                        ImportError::Persistence(format!("venue '{}' stored without id", venue.name))
                    })?;
                    cache.remember_venue(&venue_ref.name, &venue_ref.city, id);
                    ImportMetrics::record_entity_created("venue");
                    info!(
                        "Created {} venue '{}' ({}) {}",
                        if privileged { "verified" } else { "unverified" },
                        venue.name,
                        venue.city,
                        id
                    );
                    id
                }
            };
            venue_ids.push(id);
        }

        let headliner_id = headliner_of(record, &artist_ids);
        let lineup: Vec<ShowArtist> = record
            .artists
            .iter()
            .zip(&artist_ids)
            .map(|(artist, id)| ShowArtist {
                artist_id: *id,
                position: artist.position,
                set_type: artist.set_type,
            })
            .collect();

        let show_id = match update_of {
            Some(id) => {
                let mut show = self.repo.get_show(id).await?.ok_or_else(|| {
                    ImportError::Persistence(format!("show {} disappeared before update", id))
                })?;
                apply_record(&mut show, record, headliner_id, venue_ids.clone(), lineup);
                self.repo.update_show(&show).await?;
                info!("Updated show {} from {}", id, record.label());
                id
            }
            None => {
                let now = Utc::now();
                let mut show = Show {
                    id: None,
                    title: None,
                    event_day: record.event_day,
                    start_time: None,
                    city: String::new(),
                    state: String::new(),
                    price: None,
                    age_requirement: None,
                    description: None,
                    headliner_id,
                    venue_ids: Vec::new(),
                    lineup: Vec::new(),
                    source: record.source.clone(),
                    status: if privileged {
                        ShowStatus::Approved
                    } else {
                        ShowStatus::Pending
                    },
                    created_at: now,
                    updated_at: now,
                };
                apply_record(&mut show, record, headliner_id, venue_ids.clone(), lineup);
                self.repo.create_show(&mut show).await?;
                let id = show.id.ok_or_else(|| {
                    ImportError::Persistence("show stored without id".to_string())
                })?;
                ImportMetrics::record_entity_created("show");
                info!("Created {} show {} for {}", show.status.as_str(), id, record.label());
                id
            }
        };

        cache.remember_show(PlannedShow {
            id: show_id,
            headliner_id,
            venue_ids,
            event_day: record.event_day,
            label: record.label(),
            source: record.source.clone(),
        });
        Ok(show_id)
    }

    fn publish(&self, entry: &ImportResultEntry, privileged: bool) {
        let Some(sender) = &self.events else { return };
        let event = OutcomeEvent {
            index: entry.index,
            outcome: entry.outcome.clone(),
            message: entry.message.clone(),
            show_id: entry.show_id,
            privileged,
        };
        if sender.send(event).is_err() {
            debug!("No outcome subscribers for record {}", entry.index);
        }
    }
}

fn from_planned(planned: &PlannedShow) -> ExistingShow {
    ExistingShow {
        id: planned.id,
        headliner_id: planned.headliner_id,
        label: planned.label.clone(),
    }
}

fn headliner_of(record: &ShowRecord, artist_ids: &[Uuid]) -> Uuid {
    record
        .headliner_index()
        .and_then(|i| artist_ids.get(i).copied())
        .or_else(|| artist_ids.first().copied())
        .unwrap_or_else(Uuid::nil)
}

/// Copy the record's show fields onto a catalog row
fn apply_record(
    show: &mut Show,
    record: &ShowRecord,
    headliner_id: Uuid,
    venue_ids: Vec<Uuid>,
    lineup: Vec<ShowArtist>,
) {
    show.title = record.title.clone();
    show.event_day = record.event_day;
    show.start_time = record.start_time;
    show.city = record.city.clone();
    show.state = record.state.clone();
    show.price = record.price.clone();
    show.age_requirement = record.age_requirement.clone();
    show.description = record.description.clone();
    show.headliner_id = headliner_id;
    show.venue_ids = venue_ids;
    show.lineup = lineup;
}

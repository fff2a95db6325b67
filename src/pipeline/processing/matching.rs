//! Entity matching: resolving artist and venue references against the catalog.
//!
//! Exact case-insensitive lookups win. On a miss, catalog names are ranked by
//! Jaro-Winkler similarity over a normalized form of the name and the best few
//! above a threshold are returned as suggestions. Results depend only on the
//! catalog snapshot and the batch cache, so repeated calls agree.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use strsim::jaro_winkler;
use tracing::debug;
use uuid::Uuid;

use super::batch::{artist_key, venue_key, BatchCache};
use super::normalize::{ArtistRef, VenueRef};
use crate::config::MatchingConfig;
use crate::error::Result;
use crate::storage::Repository;

/// A ranked catalog entity offered when no exact match exists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub score: f64,
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MatchResult {
    Matched(Uuid),
    Suggested(Vec<Candidate>),
    New,
}

impl MatchResult {
    pub fn matched_id(&self) -> Option<Uuid> {
        match self {
            MatchResult::Matched(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, MatchResult::New)
    }
}

/// Canonical form used for similarity scoring
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase().replace('&', " and ");
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.len() > 1 && tokens[0] == "the" {
        tokens.remove(0);
    }
    tokens.join(" ")
}

pub fn similarity(a: &str, b: &str) -> f64 {
    jaro_winkler(&normalize_name(a), &normalize_name(b))
}

pub struct EntityMatcher<'a> {
    repo: &'a dyn Repository,
    cache: &'a BatchCache,
    config: &'a MatchingConfig,
}

impl<'a> EntityMatcher<'a> {
    pub fn new(repo: &'a dyn Repository, cache: &'a BatchCache, config: &'a MatchingConfig) -> Self {
        Self { repo, cache, config }
    }

    pub async fn match_artist(&self, reference: &ArtistRef) -> Result<MatchResult> {
        if let Some(cached) = self.cache.artist(&reference.name) {
            return Ok(MatchResult::Matched(cached.id));
        }
        if let Some(artist) = self.repo.find_artist_by_name(&reference.name).await? {
            if let Some(id) = artist.id {
                return Ok(MatchResult::Matched(id));
            }
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for artist in self.cache.artists() {
            seen.insert(artist_key(&artist.name));
            candidates.push(Candidate {
                id: artist.id,
                name: artist.name.clone(),
                city: None,
                score: similarity(&reference.name, &artist.name),
            });
        }
        for artist in self.repo.list_artists().await? {
            let Some(id) = artist.id else { continue };
            if !seen.insert(artist_key(&artist.name)) {
                continue;
            }
            candidates.push(Candidate {
                id,
                score: similarity(&reference.name, &artist.name),
                name: artist.name,
                city: None,
            });
        }

        let result = self.rank(candidates, |_| false);
        debug!("Artist '{}' resolved to {:?}", reference.name, result);
        Ok(result)
    }

    pub async fn match_venue(&self, reference: &VenueRef) -> Result<MatchResult> {
        if let Some(cached) = self.cache.venue(&reference.name, &reference.city) {
            return Ok(MatchResult::Matched(cached.id));
        }
        if let Some(venue) = self
            .repo
            .find_venue_by_name_and_city(&reference.name, &reference.city)
            .await?
        {
            if let Some(id) = venue.id {
                return Ok(MatchResult::Matched(id));
            }
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for venue in self.cache.venues() {
            seen.insert(venue_key(&venue.name, &venue.city));
            candidates.push(Candidate {
                id: venue.id,
                name: venue.name.clone(),
                city: Some(venue.city.clone()),
                score: similarity(&reference.name, &venue.name),
            });
        }
        for venue in self.repo.list_venues().await? {
            let Some(id) = venue.id else { continue };
            if !seen.insert(venue_key(&venue.name, &venue.city)) {
                continue;
            }
            candidates.push(Candidate {
                id,
                score: similarity(&reference.name, &venue.name),
                name: venue.name,
                city: Some(venue.city),
            });
        }

        let city = reference.city.trim().to_lowercase();
        let result = self.rank(candidates, |c| {
            c.city.as_deref().is_some_and(|v| v.to_lowercase() == city)
        });
        debug!(
            "Venue '{}' ({}) resolved to {:?}",
            reference.name, reference.city, result
        );
        Ok(result)
    }

    /// Keep candidates above the threshold, preferred ones first, then by
    /// score, name, city and id so the order never depends on storage order.
    fn rank<F>(&self, mut candidates: Vec<Candidate>, preferred: F) -> MatchResult
    where
        F: Fn(&Candidate) -> bool,
    {
        candidates.retain(|c| c.score >= self.config.min_similarity);
        candidates.sort_by(|a, b| {
            preferred(b)
                .cmp(&preferred(a))
                .then(b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.city.cmp(&b.city))
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(self.config.suggestion_limit);

        if candidates.is_empty() {
            MatchResult::New
        } else {
            MatchResult::Suggested(candidates)
        }
    }
}

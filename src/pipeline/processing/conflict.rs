use chrono::NaiveDate;
use std::collections::HashSet;
use uuid::Uuid;

use super::matching::MatchResult;
use super::normalize::ShowRecord;

/// Match results for every reference of a record, parallel to its
/// `artists` and `venues` lists
#[derive(Debug, Clone)]
pub struct RecordMatches {
    pub artists: Vec<MatchResult>,
    pub venues: Vec<MatchResult>,
}

/// A persisted (or earlier-in-batch) show relevant to a record
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingShow {
    pub id: Uuid,
    pub headliner_id: Uuid,
    pub label: String,
}

/// Shows already known for a record's keys
#[derive(Debug, Clone, Default)]
pub struct ShowContext {
    /// Show carrying the record's source identifier
    pub by_source: Option<ExistingShow>,
    /// Show sharing the resolved headliner, primary venue and day
    pub by_key: Option<ExistingShow>,
    /// Other shows at the resolved primary venue on the same day
    pub same_day: Vec<ExistingShow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeHint {
    Ready { update_of: Option<Uuid> },
    Duplicate { existing: Uuid },
    Reject(String),
    Review(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub hint: OutcomeHint,
    pub warnings: Vec<String>,
}

/// Classifies a matched record against what the catalog already holds.
/// Pure; the executor gathers the [`ShowContext`] beforehand.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    reject_past_shows: bool,
    today: NaiveDate,
}

impl ConflictDetector {
    pub fn new(reject_past_shows: bool, today: NaiveDate) -> Self {
        Self {
            reject_past_shows,
            today,
        }
    }

    pub fn detect(
        &self,
        record: &ShowRecord,
        matches: &RecordMatches,
        context: &ShowContext,
    ) -> Detection {
        let Some(headliner_index) = record.headliner_index() else {
            return Detection {
                hint: OutcomeHint::Error("no headliner could be determined".to_string()),
                warnings: Vec::new(),
            };
        };
        let headliner_match = matches.artists.get(headliner_index);
        let warnings = self.warnings(record, matches, context, headliner_match);

        let hint = if let Some(existing) = context.by_key.as_ref().filter(|_| record.source.is_none()) {
            OutcomeHint::Duplicate {
                existing: existing.id,
            }
        } else if let Some(reason) = self.rejection(record, matches) {
            OutcomeHint::Reject(reason)
        } else if let Some(reason) = review_reason(record, matches) {
            OutcomeHint::Review(reason)
        } else {
            OutcomeHint::Ready {
                update_of: context
                    .by_source
                    .as_ref()
                    .filter(|_| record.source.is_some())
                    .map(|s| s.id),
            }
        };

        Detection { hint, warnings }
    }

    fn rejection(&self, record: &ShowRecord, matches: &RecordMatches) -> Option<String> {
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for (artist, result) in record.artists.iter().zip(&matches.artists) {
            let name_seen = !names.insert(artist.name.to_lowercase());
            let id_seen = result.matched_id().is_some_and(|id| !ids.insert(id));
            if name_seen || id_seen {
                return Some(format!("artist '{}' is billed more than once", artist.name));
            }
        }
        if self.reject_past_shows && record.event_day < self.today {
            return Some(format!("show date {} is in the past", record.event_day));
        }
        None
    }

    fn warnings(
        &self,
        record: &ShowRecord,
        matches: &RecordMatches,
        context: &ShowContext,
        headliner_match: Option<&MatchResult>,
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        let matched = matches.artists.iter().filter(|m| m.matched_id().is_some()).count();
        let new = matches.artists.iter().filter(|m| m.is_new()).count();
        if new > 0 {
            warnings.push(format!("Artists: {} matched, {} new", matched, new));
            for (artist, result) in record.artists.iter().zip(&matches.artists) {
                if result.is_new() {
                    warnings.push(format!("Artist '{}' will be created", artist.name));
                }
            }
        }

        let matched = matches.venues.iter().filter(|m| m.matched_id().is_some()).count();
        let new = matches.venues.iter().filter(|m| m.is_new()).count();
        if new > 0 {
            warnings.push(format!("Venues: {} matched, {} new", matched, new));
            for (venue, result) in record.venues.iter().zip(&matches.venues) {
                if result.is_new() {
                    warnings.push(format!("Venue '{}' ({}) will be created", venue.name, venue.city));
                }
            }
        }

        let headliner_id = headliner_match.and_then(MatchResult::matched_id);
        let updating = context.by_source.as_ref().map(|s| s.id);
        for other in &context.same_day {
            if Some(other.id) == updating || Some(other.headliner_id) == headliner_id {
                continue;
            }
            warnings.push(format!(
                "Similar show on the same day at this venue: {}",
                other.label
            ));
        }

        warnings
    }
}

fn review_reason(record: &ShowRecord, matches: &RecordMatches) -> Option<String> {
    let mut reasons = Vec::new();
    for (artist, result) in record.artists.iter().zip(&matches.artists) {
        if let MatchResult::Suggested(candidates) = result {
            let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
            reasons.push(format!(
                "artist '{}' may be {}",
                artist.name,
                names.join(" or ")
            ));
        }
    }
    for (venue, result) in record.venues.iter().zip(&matches.venues) {
        if let MatchResult::Suggested(candidates) = result {
            let names: Vec<String> = candidates
                .iter()
                .map(|c| match &c.city {
                    Some(city) => format!("{} ({})", c.name, city),
                    None => c.name.clone(),
                })
                .collect();
            reasons.push(format!(
                "venue '{}' may be {}",
                venue.name,
                names.join(" or ")
            ));
        }
    }
    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join("; "))
    }
}

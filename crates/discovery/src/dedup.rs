//! Candidate deduplication
//!
//! Two passes: collapse the batch on the kind's key (last occurrence wins,
//! first-appearance order kept), then drop anything already stored.
//! Primary candidates are keyed on `external_id`; secondary candidates have
//! no stable id and are keyed on the lowercased title. Exact matches only.

use paperscout_common::{DiscoveryRecord, PaperRecord, SourceKind};
use std::collections::{HashMap, HashSet};

/// Dedup key of a candidate for `kind`
pub fn candidate_key(paper: &PaperRecord, kind: SourceKind) -> String {
    match kind {
        SourceKind::Primary => paper.external_id.clone(),
        SourceKind::Secondary => paper.title_key(),
    }
}

fn stored_key(record: &DiscoveryRecord, kind: SourceKind) -> String {
    match kind {
        SourceKind::Primary => record.external_id.clone(),
        SourceKind::Secondary => record.title_key(),
    }
}

/// Collapse a batch to one candidate per key.
pub fn collapse_batch(candidates: Vec<PaperRecord>, kind: SourceKind) -> Vec<PaperRecord> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(candidates.len());
    let mut unique: Vec<PaperRecord> = Vec::with_capacity(candidates.len());

    for paper in candidates {
        let key = candidate_key(&paper, kind);
        match slots.get(&key) {
            Some(&slot) => unique[slot] = paper,
            None => {
                slots.insert(key, unique.len());
                unique.push(paper);
            }
        }
    }

    unique
}

/// Keep only candidates whose key is not in `existing`.
pub fn exclude_existing(
    unique: Vec<PaperRecord>,
    existing: &[DiscoveryRecord],
    kind: SourceKind,
) -> Vec<PaperRecord> {
    let seen: HashSet<String> = existing.iter().map(|record| stored_key(record, kind)).collect();
    unique
        .into_iter()
        .filter(|paper| !seen.contains(&candidate_key(paper, kind)))
        .collect()
}

/// Both passes: the genuinely new candidates.
pub fn dedupe(
    candidates: Vec<PaperRecord>,
    existing: &[DiscoveryRecord],
    kind: SourceKind,
) -> Vec<PaperRecord> {
    exclude_existing(collapse_batch(candidates, kind), existing, kind)
}

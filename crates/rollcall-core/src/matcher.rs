//! Nearest-neighbour identity matching with a rejection threshold.

use crate::store::IdentityStore;
use crate::types::{Embedding, Recognition};

/// Default acceptance tolerance (Euclidean distance). Lower is stricter.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Result of matching a probe embedding against the identity store.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub recognition: Recognition,
    /// Distance to the closest identity, `None` when the store is empty.
    pub distance: Option<f32>,
    /// Store index of the closest identity, accepted or not.
    pub index: Option<usize>,
}

impl MatchResult {
    fn unknown() -> Self {
        Self {
            recognition: Recognition::Unknown,
            distance: None,
            index: None,
        }
    }
}

/// Strategy for comparing a probe embedding against the enrolled identities.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, store: &IdentityStore, tolerance: f32) -> MatchResult;
}

/// Euclidean nearest-neighbour matcher.
///
/// Accepts the closest identity only when its distance is strictly below the
/// tolerance. Ties resolve to the earliest identity in store order.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Embedding, store: &IdentityStore, tolerance: f32) -> MatchResult {
        if store.is_empty() {
            return MatchResult::unknown();
        }

        let mut best: Option<(usize, f32)> = None;
        for (i, distance) in store.query(probe).into_iter().enumerate() {
            // Strict comparison keeps the first of equal minima.
            let closer = match best {
                None => true,
                Some((_, d)) => distance < d,
            };
            if closer {
                best = Some((i, distance));
            }
        }

        let Some((idx, distance)) = best else {
            return MatchResult::unknown();
        };

        let recognition = match store.get(idx) {
            Some(identity) if distance < tolerance => Recognition::Known(identity.name.clone()),
            _ => Recognition::Unknown,
        };

        MatchResult {
            recognition,
            distance: Some(distance),
            index: Some(idx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;

    fn identity(name: &str, values: Vec<f32>) -> Identity {
        Identity {
            name: name.into(),
            embedding: Embedding::new(values),
        }
    }

    fn store(ids: Vec<Identity>) -> IdentityStore {
        IdentityStore::from_identities(ids)
    }

    #[test]
    fn test_match_within_tolerance() {
        let s = store(vec![identity("Alice", vec![0.0, 0.0])]);
        let probe = Embedding::new(vec![0.3, 0.0]);
        let result = EuclideanMatcher.compare(&probe, &s, 0.6);
        assert_eq!(result.recognition, Recognition::Known("Alice".into()));
        assert!((result.distance.unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_match_beyond_tolerance_is_unknown() {
        let s = store(vec![identity("Alice", vec![0.0, 0.0])]);
        let probe = Embedding::new(vec![0.8, 0.0]);
        let result = EuclideanMatcher.compare(&probe, &s, 0.6);
        assert_eq!(result.recognition, Recognition::Unknown);
        assert_eq!(result.index, Some(0));
    }

    #[test]
    fn test_distance_equal_to_tolerance_is_rejected() {
        let s = store(vec![identity("Alice", vec![0.0, 0.0])]);
        let probe = Embedding::new(vec![0.5, 0.0]);
        let result = EuclideanMatcher.compare(&probe, &s, 0.5);
        assert_eq!(result.recognition, Recognition::Unknown);
    }

    #[test]
    fn test_empty_store_is_unknown() {
        let probe = Embedding::new(vec![0.1, 0.2]);
        let result = EuclideanMatcher.compare(&probe, &IdentityStore::default(), 0.6);
        assert_eq!(result, MatchResult::unknown());
    }

    #[test]
    fn test_picks_minimum_distance() {
        let s = store(vec![
            identity("far", vec![1.0, 1.0]),
            identity("near", vec![0.1, 0.0]),
            identity("mid", vec![0.4, 0.0]),
        ]);
        let probe = Embedding::new(vec![0.0, 0.0]);
        let result = EuclideanMatcher.compare(&probe, &s, 0.6);
        assert_eq!(result.recognition, Recognition::Known("near".into()));
        assert_eq!(result.index, Some(1));
    }

    #[test]
    fn test_tie_resolves_to_first_in_store_order() {
        let s = store(vec![
            identity("first", vec![0.2, 0.0]),
            identity("second", vec![-0.2, 0.0]),
        ]);
        let probe = Embedding::new(vec![0.0, 0.0]);
        let result = EuclideanMatcher.compare(&probe, &s, 0.6);
        assert_eq!(result.recognition, Recognition::Known("first".into()));
        assert_eq!(result.index, Some(0));
    }

    #[test]
    fn test_mismatched_dimensions_never_match() {
        let s = store(vec![identity("Alice", vec![0.0, 0.0, 5.0])]);
        let probe = Embedding::new(vec![0.0, 0.0]);
        let result = EuclideanMatcher.compare(&probe, &s, 0.6);
        assert_eq!(result.recognition, Recognition::Unknown);
        assert_eq!(result.distance, Some(f32::INFINITY));
    }

    #[test]
    fn test_mismatched_entry_does_not_shadow_comparable_one() {
        let s = store(vec![
            identity("stale", vec![0.0, 0.0, 0.0]),
            identity("Bob", vec![0.1, 0.0]),
        ]);
        let probe = Embedding::new(vec![0.0, 0.0]);
        let result = EuclideanMatcher.compare(&probe, &s, 0.6);
        assert_eq!(result.recognition, Recognition::Known("Bob".into()));
        assert_eq!(result.index, Some(1));
    }
}

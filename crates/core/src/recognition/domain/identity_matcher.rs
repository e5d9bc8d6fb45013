use crate::recognition::domain::descriptor::Descriptor;
use crate::recognition::domain::gallery::Gallery;
use crate::shared::constants::{DEFAULT_MATCH_THRESHOLD, UNKNOWN_LABEL};

/// Best gallery match for one observed descriptor.
///
/// `identity` is `None` when no reference came within the threshold;
/// `distance` is still the closest distance seen (infinite for an empty
/// gallery).
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub identity: Option<String>,
    pub distance: f64,
}

impl MatchResult {
    pub fn known(identity: impl Into<String>, distance: f64) -> Self {
        Self {
            identity: Some(identity.into()),
            distance,
        }
    }

    pub fn unknown(distance: f64) -> Self {
        Self {
            identity: None,
            distance,
        }
    }

    /// Display label: the identity name or `"unknown"`.
    pub fn label(&self) -> &str {
        self.identity.as_deref().unwrap_or(UNKNOWN_LABEL)
    }

    pub fn is_unknown(&self) -> bool {
        self.identity.is_none()
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.2})", self.label(), self.distance)
    }
}

/// Nearest-neighbor identity lookup by Euclidean descriptor distance.
///
/// A face matches when its closest reference is at or below `threshold`;
/// lower thresholds are stricter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IdentityMatcher {
    threshold: f64,
}

impl IdentityMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn find_best_match(&self, descriptor: &Descriptor, gallery: &Gallery) -> MatchResult {
        let best = gallery
            .entries()
            .iter()
            .flat_map(|entry| {
                entry
                    .descriptors
                    .iter()
                    .map(move |reference| (entry.identity_name.as_str(), descriptor.distance(reference)))
            })
            .fold(None::<(&str, f64)>, |best, (name, distance)| match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((name, distance)),
            });

        match best {
            Some((name, distance)) if distance <= self.threshold => MatchResult::known(name, distance),
            Some((_, distance)) => MatchResult::unknown(distance),
            None => MatchResult::unknown(f64::INFINITY),
        }
    }
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

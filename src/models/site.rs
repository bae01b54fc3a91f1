use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::Fingerprint;

/// Maximum number of fingerprints kept per site.
pub const MAX_FINGERPRINTS: usize = 50;

/// Stable identifier of a monitored site: md5 of its configured URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteKey(pub String);

impl SiteKey {
    pub fn from_url(url: &str) -> Self {
        SiteKey(format!("{:x}", md5::compute(url.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted per-site record. Fields other than `hashes` are carried through
/// untouched so older state files round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteState {
    #[serde(default)]
    pub hashes: Vec<Fingerprint>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SiteState {
    pub fn fingerprints(&self) -> HashSet<Fingerprint> {
        self.hashes.iter().cloned().collect()
    }

    /// Overwrites the stored fingerprints with `fingerprints`, keeping the
    /// caller's order, dropping repeats and truncating to [`MAX_FINGERPRINTS`].
    pub fn replace<I>(&mut self, fingerprints: I)
    where
        I: IntoIterator<Item = Fingerprint>,
    {
        let mut seen = HashSet::new();
        self.hashes = fingerprints
            .into_iter()
            .filter(|fp| seen.insert(fp.clone()))
            .take(MAX_FINGERPRINTS)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(i: usize) -> Fingerprint {
        Fingerprint(format!("{i:032x}"))
    }

    #[test]
    fn site_key_is_stable_md5_of_url() {
        let a = SiteKey::from_url("https://example.com/notice");
        let b = SiteKey::from_url("https://example.com/notice");
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            format!("{:x}", md5::compute(b"https://example.com/notice"))
        );
    }

    #[test]
    fn replace_truncates_and_keeps_order() {
        let mut state = SiteState::default();
        state.replace((0..80).map(fp));

        assert_eq!(state.hashes.len(), MAX_FINGERPRINTS);
        assert_eq!(state.hashes[0], fp(0));
        assert_eq!(state.hashes[49], fp(49));
    }

    #[test]
    fn replace_drops_repeats() {
        let mut state = SiteState::default();
        state.replace(vec![fp(1), fp(2), fp(1), fp(3)]);
        assert_eq!(state.hashes, vec![fp(1), fp(2), fp(3)]);
    }

    #[test]
    fn unknown_fields_survive_serde() {
        let raw = r#"{"hashes":["a","b"],"last_check":"2025-09-01"}"#;
        let state: SiteState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.hashes.len(), 2);
        assert_eq!(state.extra["last_check"], "2025-09-01");

        let back = serde_json::to_value(&state).unwrap();
        assert_eq!(back["last_check"], "2025-09-01");
        assert_eq!(back["hashes"][1], "b");
    }
}

//! Catalog resolver
//!
//! Associates an aggregated sales track with a track of a catalog release.
//! Strategies run as strict tiers; the first tier with any qualifying
//! candidate decides the match:
//!
//! 1. Exact ISRC
//! 2. ISRC prefix (first 6 characters)
//! 3. Exact UPC (track index 0)
//! 4. UPC prefix (first 6 characters, track index 0)
//! 5. Track title + artist, fuzzy
//! 6. Release title + artist, fuzzy (track index 0)
//!
//! **Ranking:** within a tier every candidate is scored and the highest score
//! wins. Equal scores go to the smallest release id, then the smallest track
//! index, so the result does not depend on catalog row order.
//!
//! **Failures:** a catalog read error is logged and only disables the tiers
//! that needed that read. `resolve` itself never fails.

use crate::models::{AggregatedTrack, MatchBasis, TrackMatch};
use crate::services::fuzzy::{fuzzy_match, normalize, similarity};
use async_trait::async_trait;
use royalty_common::db::catalog::CatalogRelease;
use royalty_common::Result;
use tracing::{debug, warn};

/// Length of the code prefix compared by the prefix tiers
const CODE_PREFIX_LEN: usize = 6;

/// Read access to match-eligible catalog releases
///
/// Implementations return only releases whose status allows matching.
#[async_trait]
pub trait ReleaseCatalog: Send + Sync {
    /// Every eligible release with its tracks
    async fn eligible_releases(&self) -> Result<Vec<CatalogRelease>>;

    /// Eligible releases with exactly this UPC
    async fn releases_by_upc(&self, upc: &str) -> Result<Vec<CatalogRelease>>;

    /// Eligible releases whose UPC starts with `prefix`
    async fn releases_by_upc_prefix(&self, prefix: &str) -> Result<Vec<CatalogRelease>>;
}

/// A qualifying (release, track) pair with its tier score
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    release: &'a CatalogRelease,
    track_index: usize,
    score: f64,
}

impl<'a> Candidate<'a> {
    fn beats(&self, other: &Candidate<'_>) -> bool {
        if self.score != other.score {
            return self.score > other.score;
        }
        (self.release.id.as_str(), self.track_index) < (other.release.id.as_str(), other.track_index)
    }
}

fn best<'a>(candidates: impl IntoIterator<Item = Candidate<'a>>) -> Option<Candidate<'a>> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(current) if !candidate.beats(&current) => Some(current),
        _ => Some(candidate),
    })
}

/// Tiered catalog matcher
pub struct CatalogResolver<C: ReleaseCatalog> {
    catalog: C,
}

impl<C: ReleaseCatalog> CatalogResolver<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Find the catalog track for `track`, or None when no tier matches
    pub async fn resolve(&self, track: &AggregatedTrack) -> Option<TrackMatch> {
        let key = track.key();
        let result = self.resolve_tiers(track).await;

        match &result {
            Some(m) => debug!(
                track = %key,
                release_id = %m.release_id,
                track_index = m.track_index,
                basis = m.basis.as_str(),
                "Track matched"
            ),
            None => debug!(track = %key, "Track not matched"),
        }

        result
    }

    async fn resolve_tiers(&self, track: &AggregatedTrack) -> Option<TrackMatch> {
        // Loaded at most once per track; None after a failed read
        let mut eligible: Option<Option<Vec<CatalogRelease>>> = None;

        if !track.isrc.is_empty() {
            let releases = self.eligible_cached(&mut eligible).await;
            if let Some(found) = match_isrc(releases, &track.isrc) {
                return Some(found);
            }
            if let Some(found) = match_isrc_prefix(releases, &track.isrc) {
                return Some(found);
            }
        }

        if !track.upc.is_empty() {
            match self.catalog.releases_by_upc(&track.upc).await {
                Ok(releases) => {
                    let candidates = releases.iter().map(|release| Candidate {
                        release,
                        track_index: 0,
                        score: 1.0,
                    });
                    if let Some(found) = best(candidates) {
                        return Some(to_match(found, MatchBasis::Upc));
                    }
                }
                Err(e) => warn!(upc = %track.upc, error = %e, "Catalog read failed for UPC lookup"),
            }

            let prefix = code_prefix(&track.upc);
            match self.catalog.releases_by_upc_prefix(&prefix).await {
                Ok(releases) => {
                    let candidates = releases.iter().filter_map(|release| {
                        let upc = release.upc.as_deref()?;
                        Some(Candidate {
                            release,
                            track_index: 0,
                            score: prefix_score(&track.upc.to_lowercase(), &upc.to_lowercase()),
                        })
                    });
                    if let Some(found) = best(candidates) {
                        return Some(to_match(found, MatchBasis::UpcPrefix));
                    }
                }
                Err(e) => warn!(upc = %track.upc, error = %e, "Catalog read failed for UPC prefix lookup"),
            }
        }

        if !track.track_title.is_empty() || !track.artist_name.is_empty() {
            let releases = self.eligible_cached(&mut eligible).await;
            if let Some(found) = match_title(releases, &track.track_title, &track.artist_name) {
                return Some(found);
            }
        }

        if !track.release_title.is_empty() && !track.artist_name.is_empty() {
            let releases = self.eligible_cached(&mut eligible).await;
            if let Some(found) = match_release_title(releases, &track.release_title, &track.artist_name) {
                return Some(found);
            }
        }

        None
    }

    async fn eligible_cached<'s>(
        &self,
        slot: &'s mut Option<Option<Vec<CatalogRelease>>>,
    ) -> &'s [CatalogRelease] {
        if slot.is_none() {
            let loaded = match self.catalog.eligible_releases().await {
                Ok(releases) => Some(releases),
                Err(e) => {
                    warn!(error = %e, "Catalog read failed; skipping catalog-wide strategies");
                    None
                }
            };
            *slot = Some(loaded);
        }
        slot.as_ref().and_then(|r| r.as_deref()).unwrap_or(&[])
    }
}

fn to_match(candidate: Candidate<'_>, basis: MatchBasis) -> TrackMatch {
    TrackMatch {
        release_id: candidate.release.id.clone(),
        release_kind: candidate.release.kind,
        user_id: candidate.release.user_id.clone(),
        track_index: candidate.track_index,
        basis,
    }
}

/// Iterate (release, track index, track ISRC) for tracks that carry an ISRC
fn tracks_with_isrc(releases: &[CatalogRelease]) -> impl Iterator<Item = (&CatalogRelease, usize, &str)> {
    releases.iter().flat_map(|release| {
        release.tracks.iter().enumerate().filter_map(move |(idx, t)| {
            t.isrc
                .as_deref()
                .filter(|isrc| !isrc.is_empty())
                .map(|isrc| (release, idx, isrc))
        })
    })
}

fn match_isrc(releases: &[CatalogRelease], isrc: &str) -> Option<TrackMatch> {
    let candidates = tracks_with_isrc(releases)
        .filter(|(_, _, candidate)| *candidate == isrc)
        .map(|(release, track_index, _)| Candidate {
            release,
            track_index,
            score: 1.0,
        });
    best(candidates).map(|c| to_match(c, MatchBasis::Isrc))
}

fn match_isrc_prefix(releases: &[CatalogRelease], isrc: &str) -> Option<TrackMatch> {
    let prefix = code_prefix(isrc);
    let candidates = tracks_with_isrc(releases)
        .filter(|(_, _, candidate)| candidate.starts_with(&prefix))
        .map(|(release, track_index, candidate)| Candidate {
            release,
            track_index,
            score: prefix_score(isrc, candidate),
        });
    best(candidates).map(|c| to_match(c, MatchBasis::IsrcPrefix))
}

fn match_title(releases: &[CatalogRelease], title: &str, artist: &str) -> Option<TrackMatch> {
    let title = normalize(title);
    let artist = normalize(artist);
    if title.is_empty() {
        return None;
    }

    let mut candidates = Vec::new();
    for release in releases {
        let release_artist = normalize(&release.artist_name);
        if !artist.is_empty() && !fuzzy_match(&release_artist, &artist) {
            continue;
        }

        for (track_index, catalog_track) in release.tracks.iter().enumerate() {
            let track_title = normalize(&catalog_track.title);
            if !fuzzy_match(&track_title, &title) {
                continue;
            }
            let score = if artist.is_empty() {
                similarity(&track_title, &title)
            } else {
                (similarity(&track_title, &title) + similarity(&release_artist, &artist)) / 2.0
            };
            candidates.push(Candidate {
                release,
                track_index,
                score,
            });
        }
    }

    best(candidates).map(|c| to_match(c, MatchBasis::Title))
}

/// Release-level fallback; the concrete track is unknown so index 0 is reported
fn match_release_title(releases: &[CatalogRelease], release_title: &str, artist: &str) -> Option<TrackMatch> {
    let release_title = normalize(release_title);
    let artist = normalize(artist);

    let candidates = releases.iter().filter_map(|release| {
        let candidate_artist = normalize(&release.artist_name);
        let candidate_title = normalize(&release.title);
        if !fuzzy_match(&candidate_artist, &artist) || !fuzzy_match(&candidate_title, &release_title) {
            return None;
        }
        Some(Candidate {
            release,
            track_index: 0,
            score: (similarity(&candidate_title, &release_title) + similarity(&candidate_artist, &artist)) / 2.0,
        })
    });

    best(candidates).map(|c| to_match(c, MatchBasis::ReleaseTitle))
}

fn code_prefix(code: &str) -> String {
    code.chars().take(CODE_PREFIX_LEN).collect()
}

/// Shared-prefix length over the longer code length
fn prefix_score(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    let shared = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    shared as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use royalty_common::db::catalog::{CatalogTrack, ReleaseKind, ReleaseStatus};
    use royalty_common::Error;

    struct MemoryCatalog {
        releases: Vec<CatalogRelease>,
        fail: bool,
    }

    impl MemoryCatalog {
        fn new(releases: Vec<CatalogRelease>) -> Self {
            Self { releases, fail: false }
        }

        fn eligible(&self) -> Result<Vec<CatalogRelease>> {
            if self.fail {
                return Err(Error::Internal("catalog offline".to_string()));
            }
            Ok(self
                .releases
                .iter()
                .filter(|r| r.status.is_matchable())
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl ReleaseCatalog for MemoryCatalog {
        async fn eligible_releases(&self) -> Result<Vec<CatalogRelease>> {
            self.eligible()
        }

        async fn releases_by_upc(&self, upc: &str) -> Result<Vec<CatalogRelease>> {
            Ok(self
                .eligible()?
                .into_iter()
                .filter(|r| r.upc.as_deref() == Some(upc))
                .collect())
        }

        async fn releases_by_upc_prefix(&self, prefix: &str) -> Result<Vec<CatalogRelease>> {
            Ok(self
                .eligible()?
                .into_iter()
                .filter(|r| r.upc.as_deref().is_some_and(|u| u.starts_with(prefix)))
                .collect())
        }
    }

    fn release(id: &str, artist: &str, title: &str, upc: Option<&str>, tracks: &[(&str, &str)]) -> CatalogRelease {
        CatalogRelease {
            id: id.to_string(),
            user_id: Some(format!("owner-{}", id)),
            kind: ReleaseKind::Basic,
            status: ReleaseStatus::Published,
            artist_name: artist.to_string(),
            title: title.to_string(),
            upc: upc.map(str::to_string),
            cover_url: None,
            tracks: tracks
                .iter()
                .map(|(title, isrc)| CatalogTrack {
                    title: title.to_string(),
                    isrc: if isrc.is_empty() { None } else { Some(isrc.to_string()) },
                })
                .collect(),
        }
    }

    fn sales(isrc: &str, upc: &str, title: &str, artist: &str, release_title: &str) -> AggregatedTrack {
        AggregatedTrack {
            isrc: isrc.to_string(),
            upc: upc.to_string(),
            track_title: title.to_string(),
            release_title: release_title.to_string(),
            artist_name: artist.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_exact_isrc_match() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![release(
            "r1",
            "Artist",
            "Album",
            None,
            &[("Intro", "RU-AB1-24-00000"), ("Song", "RU-AB1-24-00001")],
        )]));

        let m = resolver.resolve(&sales("RU-AB1-24-00001", "", "", "", "")).await.unwrap();
        assert_eq!(m.basis, MatchBasis::Isrc);
        assert_eq!(m.release_id, "r1");
        assert_eq!(m.track_index, 1);
        assert_eq!(m.user_id.as_deref(), Some("owner-r1"));
    }

    #[tokio::test]
    async fn test_isrc_prefix_match() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![release(
            "r1",
            "Artist",
            "Album",
            None,
            &[("Song", "RU-AB1-24-00001")],
        )]));

        let m = resolver.resolve(&sales("RU-AB1-24-99999", "", "", "", "")).await.unwrap();
        assert_eq!(m.basis, MatchBasis::IsrcPrefix);
        assert_eq!(m.release_id, "r1");
    }

    #[tokio::test]
    async fn test_isrc_prefix_prefers_longest_shared_prefix() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![
            release("a", "X", "X", None, &[("One", "RUAB12400001")]),
            release("b", "Y", "Y", None, &[("Two", "RUAB12499001")]),
        ]));

        let m = resolver.resolve(&sales("RUAB12499999", "", "", "", "")).await.unwrap();
        assert_eq!(m.release_id, "b");
    }

    #[tokio::test]
    async fn test_exact_isrc_beats_earlier_prefix_candidate() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![
            release("a", "X", "X", None, &[("One", "RUAB12400002")]),
            release("b", "Y", "Y", None, &[("Two", "RUAB12400001")]),
        ]));

        let m = resolver.resolve(&sales("RUAB12400001", "", "", "", "")).await.unwrap();
        assert_eq!(m.basis, MatchBasis::Isrc);
        assert_eq!(m.release_id, "b");
    }

    #[tokio::test]
    async fn test_tie_goes_to_smallest_release_id() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![
            release("zz", "X", "X", None, &[("One", "RUAB12400001")]),
            release("aa", "Y", "Y", None, &[("One", "RUAB12400001")]),
        ]));

        let m = resolver.resolve(&sales("RUAB12400001", "", "", "", "")).await.unwrap();
        assert_eq!(m.release_id, "aa");
    }

    #[tokio::test]
    async fn test_upc_match_uses_track_zero() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![release(
            "r1",
            "Artist",
            "Album",
            Some("4601234567890"),
            &[("One", ""), ("Two", "")],
        )]));

        let m = resolver.resolve(&sales("", "4601234567890", "Two", "", "")).await.unwrap();
        assert_eq!(m.basis, MatchBasis::Upc);
        assert_eq!(m.track_index, 0);

        let m = resolver.resolve(&sales("", "4601230000000", "", "", "")).await.unwrap();
        assert_eq!(m.basis, MatchBasis::UpcPrefix);
    }

    #[tokio::test]
    async fn test_title_and_artist_fuzzy_match() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![release(
            "r1",
            "Night Riders",
            "Album",
            None,
            &[("Intro", ""), ("Night Drive", "")],
        )]));

        let m = resolver.resolve(&sales("", "", "Nght Drive", "night riders", "")).await.unwrap();
        assert_eq!(m.basis, MatchBasis::Title);
        assert_eq!(m.track_index, 1);
    }

    #[tokio::test]
    async fn test_empty_artist_matches_any_release() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![release(
            "r1",
            "Someone",
            "Album",
            None,
            &[("Night Drive", "")],
        )]));

        let m = resolver.resolve(&sales("", "", "Night Drive", "", "")).await.unwrap();
        assert_eq!(m.basis, MatchBasis::Title);
    }

    #[tokio::test]
    async fn test_release_title_fallback() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![release(
            "r1",
            "Artist",
            "Summer Nights",
            None,
            &[("Completely Different", "")],
        )]));

        let m = resolver
            .resolve(&sales("", "", "Track 7", "Artist", "Summer Nights"))
            .await
            .unwrap();
        assert_eq!(m.basis, MatchBasis::ReleaseTitle);
        assert_eq!(m.track_index, 0);

        // Fallback needs an artist
        assert!(resolver.resolve(&sales("", "", "Track 7", "", "Summer Nights")).await.is_none());
    }

    #[tokio::test]
    async fn test_different_script_title_does_not_match() {
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![release(
            "r1",
            "Artist",
            "Album",
            None,
            &[("ночь драйв", "")],
        )]));

        assert!(resolver.resolve(&sales("", "", "night drive", "Artist", "")).await.is_none());
    }

    #[tokio::test]
    async fn test_draft_and_rejected_never_match() {
        let mut draft = release("r1", "Artist", "Album", Some("111"), &[("Song", "RUAB12400001")]);
        draft.status = ReleaseStatus::Draft;
        let mut rejected = release("r2", "Artist", "Album", Some("111"), &[("Song", "RUAB12400001")]);
        rejected.status = ReleaseStatus::Rejected;
        let resolver = CatalogResolver::new(MemoryCatalog::new(vec![draft, rejected]));

        assert!(resolver
            .resolve(&sales("RUAB12400001", "111", "Song", "Artist", "Album"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_catalog_failure_degrades_to_unmatched() {
        let mut catalog = MemoryCatalog::new(vec![release("r1", "A", "B", Some("1"), &[("Song", "X")])]);
        catalog.fail = true;
        let resolver = CatalogResolver::new(catalog);

        assert!(resolver.resolve(&sales("X", "1", "Song", "A", "B")).await.is_none());
    }

    #[test]
    fn test_prefix_score() {
        assert_eq!(prefix_score("RUAB12", "RUAB12"), 1.0);
        assert_eq!(prefix_score("RUAB", "RUAB1234"), 0.5);
        assert_eq!(prefix_score("", ""), 0.0);
    }
}

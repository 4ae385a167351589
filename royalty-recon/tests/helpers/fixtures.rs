//! Catalog and sales-file fixtures

use royalty_common::db::catalog::{insert_release, CatalogRelease, CatalogTrack, ReleaseKind, ReleaseStatus};
use royalty_recon::models::ReportFile;
use sqlx::SqlitePool;

pub const HEADER: &str = "Platform;Country/Region;Artist Name;Release title;Track title;UPC;ISRC;Quantity;Net Revenue";

fn release(
    id: &str,
    user_id: &str,
    kind: ReleaseKind,
    status: ReleaseStatus,
    upc: &str,
    tracks: &[(&str, &str)],
) -> CatalogRelease {
    CatalogRelease {
        id: id.to_string(),
        user_id: Some(user_id.to_string()),
        kind,
        status,
        artist_name: "Catalog Artist".to_string(),
        title: format!("{} title", id),
        upc: Some(upc.to_string()),
        cover_url: None,
        tracks: tracks
            .iter()
            .map(|(title, isrc)| CatalogTrack {
                title: title.to_string(),
                isrc: Some(isrc.to_string()),
            })
            .collect(),
    }
}

/// u1 owns a published basic release, u2 a distributed exclusive one,
/// u3 only a draft that must never match
pub async fn seed_catalog(pool: &SqlitePool) {
    let releases = [
        release(
            "rel-basic",
            "u1",
            ReleaseKind::Basic,
            ReleaseStatus::Published,
            "4601234567890",
            &[("Night Drive", "RUAB12400001"), ("Morning", "RUAB12400002")],
        ),
        release(
            "rel-exclusive",
            "u2",
            ReleaseKind::Exclusive,
            ReleaseStatus::Distributed,
            "4609999000001",
            &[("Ночь", "RUCD12400010")],
        ),
        release(
            "rel-draft",
            "u3",
            ReleaseKind::Basic,
            ReleaseStatus::Draft,
            "4600000000009",
            &[("Ghost", "RUXX12400001")],
        ),
    ];

    for r in &releases {
        insert_release(pool, r).await.unwrap();
    }
}

pub const SPOTIFY_ROWS: [&str; 4] = [
    "Spotify;RU;Artist;Album;Night Drive;4601234567890;RUAB12400001;100;10.50",
    "Apple Music;KZ;Artist;Album;Night Drive;4601234567890;RUAB12400001;50;4.50",
    "Spotify;RU;Artist;Album;Morning;4601234567890;RUAB12400002;abc;2.00",
    "YouTube;;Other;Other;Ghost;;RUXX12400001;10;1.00",
];

pub const APPLE_ROWS: [&str; 1] = ["Apple Music;RU;Artist 2;X;Ночь;4609999000001;RUCD12400010;30;3.00"];

/// Two sales files and a summary sheet
///
/// Totals: 5 rows, 190 streams, 21.00 revenue; u1 earns 17.00, u2 earns 3.00,
/// and the draft-owned track stays unmatched.
pub fn report_files() -> Vec<ReportFile> {
    vec![
        ReportFile {
            name: "spotify.csv".to_string(),
            content: format!("{}\n{}", HEADER, SPOTIFY_ROWS.join("\n")),
        },
        ReportFile {
            name: "apple.csv".to_string(),
            content: format!("{}\r\n{}\r\n", HEADER, APPLE_ROWS.join("\r\n")),
        },
        ReportFile {
            name: "platform_summary.csv".to_string(),
            content: "Platform;Total\nSpotify;999".to_string(),
        },
    ]
}

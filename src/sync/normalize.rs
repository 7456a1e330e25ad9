//! Flattening profile and publication data into destination rows
//!
//! Every publication becomes one 34-column row. Profile fields are repeated
//! on every row, as are the profile-wide last-published date and the sync
//! timestamp. Normalization is pure: the same inputs always give the same
//! table.

use chrono::{DateTime, Utc};

use crate::models::{CellValue, ProfileSnapshot, PublicationRecord};
use crate::storage::Table;
use crate::utils::{format_epoch_millis, format_timestamp};

/// Number of destination columns
pub const STATS_WIDTH: usize = 34;

/// Canonical destination header
pub const STATS_HEADER: [&str; STATS_WIDTH] = [
    "Viz - ID",
    "Viz - Title",
    "Viz - Description",
    "Viz - URL",
    "Viz - URL (No Home)",
    "Viz - Thumbnail URL",
    "Viz - Default View",
    "Viz - Visible",
    "Viz - Permalink",
    "Viz - Views",
    "Viz - Favorites",
    "Viz - First Published",
    "Viz - Last Published",
    "Viz - Revision",
    "Viz - Size",
    "User - Name",
    "User - Profile ID",
    "User - Organization",
    "User - Bio",
    "User - Avatar URL",
    "User - Searchable",
    "User - Featured Viz",
    "User - Last Published",
    "User - Follower Count",
    "User - Following Count",
    "User - Country",
    "User - State or Region",
    "User - City",
    "User - Website",
    "User - LinkedIn",
    "User - Twitter",
    "User - Facebook",
    "User - Tableau Public",
    "Stats - Stats Last Refreshed",
];

/// 0-based positions of the columns the summary pass reads back
pub mod columns {
    pub const VISIBLE: usize = 7;
    pub const VIEWS: usize = 9;
    pub const FAVORITES: usize = 10;
    pub const FOLLOWERS: usize = 23;
    pub const FOLLOWING: usize = 24;
}

/// Public links derived for one publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationLinks {
    pub viz: String,
    pub no_chrome: String,
    pub thumbnail: String,
}

/// One destination row
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub publication_id: String,
    pub title: String,
    pub description: String,
    pub links: PublicationLinks,
    pub default_view_name: String,
    pub visible: bool,
    pub permalink: String,
    pub view_count: i64,
    pub favorite_count: i64,
    pub first_published: String,
    pub last_published: String,
    pub revision: String,
    pub size: i64,
    pub user_name: String,
    pub profile_id: String,
    pub organization: String,
    pub bio: String,
    pub avatar_url: String,
    pub searchable: bool,
    pub featured_publication: String,
    pub user_last_published: String,
    pub follower_count: i64,
    pub following_count: i64,
    pub country: String,
    pub region: String,
    pub city: String,
    pub website: String,
    pub linkedin: String,
    pub twitter: String,
    pub facebook: String,
    pub profile_url: String,
    pub refreshed: String,
}

impl NormalizedRow {
    /// Cells in header order
    pub fn cells(&self) -> [CellValue; STATS_WIDTH] {
        [
            CellValue::text(self.publication_id.as_str()),
            CellValue::text(self.title.as_str()),
            CellValue::text(self.description.as_str()),
            CellValue::text(self.links.viz.as_str()),
            CellValue::text(self.links.no_chrome.as_str()),
            CellValue::text(self.links.thumbnail.as_str()),
            CellValue::text(self.default_view_name.as_str()),
            CellValue::Bool(self.visible),
            CellValue::text(self.permalink.as_str()),
            CellValue::Int(self.view_count),
            CellValue::Int(self.favorite_count),
            CellValue::text(self.first_published.as_str()),
            CellValue::text(self.last_published.as_str()),
            CellValue::text(self.revision.as_str()),
            CellValue::Int(self.size),
            CellValue::text(self.user_name.as_str()),
            CellValue::text(self.profile_id.as_str()),
            CellValue::text(self.organization.as_str()),
            CellValue::text(self.bio.as_str()),
            CellValue::text(self.avatar_url.as_str()),
            CellValue::Bool(self.searchable),
            CellValue::text(self.featured_publication.as_str()),
            CellValue::text(self.user_last_published.as_str()),
            CellValue::Int(self.follower_count),
            CellValue::Int(self.following_count),
            CellValue::text(self.country.as_str()),
            CellValue::text(self.region.as_str()),
            CellValue::text(self.city.as_str()),
            CellValue::text(self.website.as_str()),
            CellValue::text(self.linkedin.as_str()),
            CellValue::text(self.twitter.as_str()),
            CellValue::text(self.facebook.as_str()),
            CellValue::text(self.profile_url.as_str()),
            CellValue::text(self.refreshed.as_str()),
        ]
    }
}

/// Builds destination tables from fetched data
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    site_url: String,
}

impl RecordNormalizer {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public profile page
    pub fn profile_url(&self, profile_id: &str) -> String {
        format!("{}/profile/{}#!/", self.site_url, profile_id)
    }

    /// Links for a default view reference such as `Book/sheets/Dashboard`
    pub fn links(&self, profile_url: &str, default_view_ref: &str) -> PublicationLinks {
        let view_path = default_view_ref.replace("/sheets", "");
        let prefix: String = default_view_ref.chars().take(2).collect();

        PublicationLinks {
            viz: format!("{profile_url}vizhome/{view_path}"),
            no_chrome: format!(
                "{}/views/{}?:embed=y&:display_count=yes&:showVizHome=no",
                self.site_url, view_path
            ),
            thumbnail: format!(
                "{}/static/images/{}/{}/4_3.png",
                self.site_url, prefix, view_path
            ),
        }
    }

    /// Build one row per publication
    pub fn rows(
        &self,
        profile: &ProfileSnapshot,
        records: &[PublicationRecord],
        synced_at: DateTime<Utc>,
    ) -> Vec<NormalizedRow> {
        let profile_url = self.profile_url(&profile.profile_name);
        let refreshed = format_timestamp(synced_at);

        records
            .iter()
            .map(|record| NormalizedRow {
                publication_id: record.id.clone(),
                title: record.title.clone(),
                description: record.description.clone(),
                links: self.links(&profile_url, &record.default_view_ref),
                default_view_name: record.default_view_name.clone(),
                visible: record.visible,
                permalink: record.permalink.clone(),
                view_count: record.view_count,
                favorite_count: record.favorite_count,
                first_published: format_epoch_millis(record.first_published),
                last_published: format_epoch_millis(record.last_published),
                revision: record.revision.clone(),
                size: record.size,
                user_name: profile.name.clone(),
                profile_id: profile.profile_name.clone(),
                organization: profile.organization.clone(),
                bio: profile.bio.clone(),
                avatar_url: profile.avatar_url.clone(),
                searchable: profile.searchable,
                featured_publication: profile.featured_publication.clone(),
                user_last_published: format_epoch_millis(record.profile_last_published),
                follower_count: profile.follower_count,
                following_count: profile.following_count,
                country: profile.location.country.clone(),
                region: profile.location.region.clone(),
                city: profile.location.city.clone(),
                website: profile.social.website.clone(),
                linkedin: profile.social.linkedin.clone(),
                twitter: profile.social.twitter.clone(),
                facebook: profile.social.facebook.clone(),
                profile_url: profile_url.clone(),
                refreshed: refreshed.clone(),
            })
            .collect()
    }

    /// Header plus one row per publication
    pub fn normalize(
        &self,
        profile: &ProfileSnapshot,
        records: &[PublicationRecord],
        synced_at: DateTime<Utc>,
    ) -> Table {
        let rows = self.rows(profile, records, synced_at);
        Table::from_fixed(STATS_HEADER, rows.iter().map(NormalizedRow::cells))
    }
}

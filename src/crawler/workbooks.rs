//! Paginated workbook listing
//!
//! This module walks the upstream workbook listing for one profile, page by
//! page, and turns every entry into a [`PublicationRecord`].
//!
//! Pagination starts at offset 0 and advances by the page size. It stops on
//! the first empty page or when the listing reports `"next": null`. Listing
//! entries that do not carry the full workbook descriptor are completed with
//! one call to the single-workbook endpoint.

use serde::Deserialize;
use std::sync::Arc;

use crate::crawler::fetcher::PublicApiClient;
use crate::models::PublicationRecord;
use crate::utils::error::FetchError;

/// Path of the listing endpoint
pub const LISTING_PATH: &str = "/public/apis/workbooks";

/// Raw workbook descriptor as returned by the listing or detail endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWorkbook {
    workbook_repo_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    default_view_repo_url: Option<String>,
    default_view_name: Option<String>,
    show_in_profile: Option<bool>,
    view_count: Option<i64>,
    number_of_favorites: Option<i64>,
    permalink: Option<String>,
    first_publish_date: Option<i64>,
    last_publish_date: Option<i64>,
    #[serde(default)]
    revision: serde_json::Value,
    size: Option<i64>,
}

impl RawWorkbook {
    /// Listing entries only carry the repo URL unless stats are inlined
    fn has_stats(&self) -> bool {
        self.view_count.is_some() && self.last_publish_date.is_some()
    }

    fn into_record(self, fallback_id: Option<String>) -> Result<PublicationRecord, FetchError> {
        let revision = match self.revision {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };

        Ok(PublicationRecord {
            id: self
                .workbook_repo_url
                .or(fallback_id)
                .ok_or(FetchError::MissingField("workbookRepoUrl"))?,
            title: self.title.ok_or(FetchError::MissingField("title"))?,
            description: self.description.unwrap_or_default(),
            default_view_ref: self
                .default_view_repo_url
                .ok_or(FetchError::MissingField("defaultViewRepoUrl"))?,
            default_view_name: self.default_view_name.unwrap_or_default(),
            visible: self
                .show_in_profile
                .ok_or(FetchError::MissingField("showInProfile"))?,
            permalink: self.permalink.unwrap_or_default(),
            view_count: self.view_count.ok_or(FetchError::MissingField("viewCount"))?,
            favorite_count: self
                .number_of_favorites
                .ok_or(FetchError::MissingField("numberOfFavorites"))?,
            first_published: self
                .first_publish_date
                .ok_or(FetchError::MissingField("firstPublishDate"))?,
            last_published: self
                .last_publish_date
                .ok_or(FetchError::MissingField("lastPublishDate"))?,
            revision,
            size: self.size.unwrap_or_default(),
            profile_last_published: 0,
        })
    }
}

/// Walks the paged workbook listing of one profile
///
/// The sequence is lazy and finite: each call to [`next_page`](Self::next_page)
/// performs one listing request. Once the terminal page has been seen the
/// paginator stays exhausted.
pub struct WorkbookPaginator {
    client: Arc<PublicApiClient>,
    profile_id: String,
    page_size: u32,
    offset: u32,
    exhausted: bool,
    pages_fetched: u32,
}

impl WorkbookPaginator {
    pub fn new(client: Arc<PublicApiClient>, profile_id: &str, page_size: u32) -> Self {
        Self {
            client,
            profile_id: profile_id.trim().to_string(),
            page_size: page_size.max(1),
            offset: 0,
            exhausted: false,
            pages_fetched: 0,
        }
    }

    /// Number of listing requests made so far
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetch the next page of publications
    ///
    /// Returns `Ok(None)` once the listing is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if a listing or detail call fails or an entry is
    /// incomplete. The paginator is exhausted after an error.
    pub async fn next_page(&mut self) -> Result<Option<Vec<PublicationRecord>>, FetchError> {
        if self.exhausted {
            return Ok(None);
        }

        let result = self.fetch_page().await;
        if result.is_err() {
            self.exhausted = true;
        }
        result
    }

    async fn fetch_page(&mut self) -> Result<Option<Vec<PublicationRecord>>, FetchError> {
        let query = [
            ("count", self.page_size.to_string()),
            ("start", self.offset.to_string()),
            ("profileName", self.profile_id.clone()),
            ("visibility", String::from("NON_HIDDEN")),
        ];

        tracing::debug!(
            profile_id = %self.profile_id,
            start = self.offset,
            count = self.page_size,
            "Fetching workbook listing page"
        );

        let body: serde_json::Value = self.client.get_json(LISTING_PATH, &query).await?;
        self.pages_fetched += 1;
        self.offset += self.page_size;

        let (entries, has_more) = parse_listing_page(body)?;
        if entries.is_empty() {
            tracing::debug!(profile_id = %self.profile_id, "Empty listing page, stopping pagination");
            self.exhausted = true;
            return Ok(None);
        }
        if !has_more {
            self.exhausted = true;
        }

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            records.push(self.resolve_entry(entry).await?);
        }

        tracing::debug!(
            profile_id = %self.profile_id,
            records = records.len(),
            has_more,
            "Processed listing page"
        );

        Ok(Some(records))
    }

    async fn resolve_entry(&self, entry: serde_json::Value) -> Result<PublicationRecord, FetchError> {
        let raw: RawWorkbook =
            serde_json::from_value(entry).map_err(|e| FetchError::Decode(e.to_string()))?;

        if raw.has_stats() {
            return raw.into_record(None);
        }

        let repo_url = raw
            .workbook_repo_url
            .ok_or(FetchError::MissingField("workbookRepoUrl"))?;
        let detail: RawWorkbook = self
            .client
            .get_json(&detail_path(&repo_url), &[])
            .await?;
        detail.into_record(Some(repo_url))
    }

    /// Drain every page into one sequence
    ///
    /// After the full sequence is materialized every record's
    /// `profile_last_published` is set to the maximum `last_published` over
    /// the whole sequence.
    ///
    /// # Errors
    ///
    /// Returns the first `FetchError` encountered; partial results are dropped
    pub async fn collect_all(mut self) -> Result<Vec<PublicationRecord>, FetchError> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page);
        }

        stamp_profile_last_published(&mut records);

        tracing::info!(
            profile_id = %self.profile_id,
            total = records.len(),
            pages = self.pages_fetched,
            "Completed workbook listing"
        );

        Ok(records)
    }
}

/// Path of the single-workbook detail endpoint
pub fn detail_path(workbook_repo_url: &str) -> String {
    format!("/profile/api/single_workbook/{workbook_repo_url}")
}

/// Split a listing body into its entries and whether more pages follow
///
/// An explicit `"next": null` ends pagination; a missing `next` leaves the
/// decision to the next (possibly empty) page.
fn parse_listing_page(body: serde_json::Value) -> Result<(Vec<serde_json::Value>, bool), FetchError> {
    let serde_json::Value::Object(mut obj) = body else {
        return Err(FetchError::Decode("listing response is not an object".into()));
    };

    let entries = match obj.remove("contents") {
        Some(serde_json::Value::Array(items)) => items,
        Some(serde_json::Value::Null) | None => Vec::new(),
        Some(_) => return Err(FetchError::Decode("listing contents is not an array".into())),
    };

    let has_more = !matches!(obj.get("next"), Some(serde_json::Value::Null));
    Ok((entries, has_more))
}

/// Overwrite every record's profile-level last-published value with the
/// maximum over the whole sequence
pub fn stamp_profile_last_published(records: &mut [PublicationRecord]) {
    let Some(latest) = records.iter().map(|r| r.last_published).max() else {
        return;
    };
    for record in records.iter_mut() {
        record.profile_last_published = latest;
    }
}

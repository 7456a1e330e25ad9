//! Upstream public API access
//!
//! This module implements retrieval of profile metadata and published
//! workbooks from the upstream platform, with rate limiting and defensive
//! parsing.

pub mod fetcher;
pub mod profile;
pub mod workbooks;

use std::sync::Arc;

pub use fetcher::PublicApiClient;
pub use profile::ProfileFetcher;
pub use workbooks::WorkbookPaginator;

use crate::models::{ProfileSnapshot, PublicationRecord};
use crate::utils::error::FetchError;

/// A profile together with every publication fetched for it in one cycle
#[derive(Debug, Clone)]
pub struct ProfileHarvest {
    pub profile: ProfileSnapshot,
    pub publications: Vec<PublicationRecord>,
}

/// Fetches a profile and then its full workbook listing
pub struct ProfileCrawler {
    client: Arc<PublicApiClient>,
    profiles: ProfileFetcher,
    page_size: u32,
}

impl ProfileCrawler {
    pub fn new(client: Arc<PublicApiClient>, page_size: u32) -> Self {
        Self {
            profiles: ProfileFetcher::new(Arc::clone(&client)),
            client,
            page_size,
        }
    }

    /// Fetch the profile first; the listing is only walked when it parses
    ///
    /// # Errors
    ///
    /// Returns the first `FetchError` from either step
    pub async fn harvest(&self, profile_id: &str) -> Result<ProfileHarvest, FetchError> {
        let profile = self.profiles.fetch(profile_id).await?;
        let publications =
            WorkbookPaginator::new(Arc::clone(&self.client), profile_id, self.page_size)
                .collect_all()
                .await?;

        Ok(ProfileHarvest {
            profile,
            publications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawler_creation() {
        let client = Arc::new(PublicApiClient::with_base_url("http://localhost:1").unwrap());
        let crawler = ProfileCrawler::new(client, 50);
        assert_eq!(crawler.page_size, 50);
    }
}

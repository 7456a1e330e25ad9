//! Profile metadata retrieval
//!
//! Fetches one profile from the upstream profile endpoint and parses it
//! defensively: optional fields default to empty strings, a malformed
//! address document yields an empty location, and only the required fields
//! can fail the fetch.

use serde::Deserialize;
use std::sync::Arc;

use crate::crawler::fetcher::PublicApiClient;
use crate::models::{Location, ProfileSnapshot, SocialLinks};
use crate::utils::error::FetchError;

/// Raw profile payload; every field is optional so missing ones can be
/// reported by name instead of as a generic decode failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    name: Option<String>,
    organization: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    total_number_of_followers: Option<i64>,
    total_number_of_following: Option<i64>,
    profile_name: Option<String>,
    searchable: Option<bool>,
    featured_viz_repo_url: Option<String>,
    #[serde(default)]
    websites: Option<Vec<RawWebsite>>,
    #[serde(default)]
    address: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawWebsite {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAddress {
    country: Option<String>,
    state: Option<String>,
    city: Option<String>,
}

/// Retrieves and parses profile metadata
pub struct ProfileFetcher {
    client: Arc<PublicApiClient>,
}

impl ProfileFetcher {
    pub fn new(client: Arc<PublicApiClient>) -> Self {
        Self { client }
    }

    /// Path of the profile endpoint for a profile id
    pub fn profile_path(profile_id: &str) -> String {
        format!("/profile/api/{}", profile_id.trim())
    }

    /// Fetch one profile
    ///
    /// # Errors
    ///
    /// Returns `FetchError` when the request fails, the body is not JSON, or
    /// a required field is missing
    pub async fn fetch(&self, profile_id: &str) -> Result<ProfileSnapshot, FetchError> {
        let body: serde_json::Value = self
            .client
            .get_json(&Self::profile_path(profile_id), &[])
            .await?;

        let snapshot = parse_profile(body)?;
        tracing::debug!(
            profile_id,
            followers = snapshot.follower_count,
            "Fetched profile"
        );
        Ok(snapshot)
    }
}

/// Parse a profile payload into a snapshot
///
/// # Errors
///
/// Returns `FetchError::Decode` if the payload is not an object and
/// `FetchError::MissingField` when a required field is absent
pub fn parse_profile(body: serde_json::Value) -> Result<ProfileSnapshot, FetchError> {
    let raw: RawProfile =
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(ProfileSnapshot {
        name: raw.name.ok_or(FetchError::MissingField("name"))?,
        follower_count: raw
            .total_number_of_followers
            .ok_or(FetchError::MissingField("totalNumberOfFollowers"))?,
        following_count: raw
            .total_number_of_following
            .ok_or(FetchError::MissingField("totalNumberOfFollowing"))?,
        profile_name: raw
            .profile_name
            .ok_or(FetchError::MissingField("profileName"))?,
        searchable: raw.searchable.ok_or(FetchError::MissingField("searchable"))?,
        organization: raw.organization.unwrap_or_default(),
        bio: raw.bio.unwrap_or_default(),
        avatar_url: raw.avatar_url.unwrap_or_default(),
        featured_publication: raw.featured_viz_repo_url.unwrap_or_default(),
        location: parse_location(raw.address.as_ref()),
        social: categorize_websites(raw.websites.unwrap_or_default()),
    })
}

/// Parse the embedded address document
///
/// The upstream sends the address as a JSON string; an object is accepted
/// too. Anything malformed yields an empty location.
pub fn parse_location(address: Option<&serde_json::Value>) -> Location {
    let raw = match address {
        Some(serde_json::Value::String(text)) => {
            serde_json::from_str::<RawAddress>(text).unwrap_or_default()
        }
        Some(value @ serde_json::Value::Object(_)) => {
            serde_json::from_value::<RawAddress>(value.clone()).unwrap_or_default()
        }
        _ => RawAddress::default(),
    };

    Location {
        country: raw.country.unwrap_or_default(),
        region: raw.state.unwrap_or_default(),
        city: raw.city.unwrap_or_default(),
    }
}

fn categorize_websites(websites: Vec<RawWebsite>) -> SocialLinks {
    let mut links = SocialLinks::default();
    for site in websites {
        let title = site.title.unwrap_or_default();
        let url = site.url.unwrap_or_default();
        // Labels are matched exactly; the last entry of each kind wins.
        match title.as_str() {
            "facebook.com" => links.facebook = url,
            "twitter.com" => links.twitter = url,
            "linkedin.com" => links.linkedin = url,
            _ => links.website = url,
        }
    }
    links
}

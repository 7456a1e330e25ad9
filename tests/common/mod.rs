//! Common test utilities

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use statsync::config::Config;
use statsync::notifications::Notifier;

#[allow(dead_code)]
pub const REGISTRY_SHEET: &str = "Form Responses 1";

/// Minimal valid profile payload
#[allow(dead_code)]
pub fn profile_json(profile_name: &str) -> Value {
    json!({
        "name": "Ada Lovelace",
        "organization": "Analytical Engines",
        "bio": null,
        "avatarUrl": "https://img.example.com/ada.png",
        "totalNumberOfFollowers": 120,
        "totalNumberOfFollowing": 8,
        "profileName": profile_name,
        "searchable": true,
        "featuredVizRepoUrl": null,
        "websites": [
            {"title": "twitter.com", "url": "https://twitter.com/ada"}
        ],
        "address": "{\"country\":\"USA\",\"state\":\"WI\",\"city\":\"Madison\"}"
    })
}

/// Listing entry carrying the full workbook descriptor
#[allow(dead_code)]
pub fn workbook_json(id: &str, views: i64, favorites: i64, last_published: i64) -> Value {
    json!({
        "workbookRepoUrl": id,
        "title": format!("Title {id}"),
        "description": "",
        "defaultViewRepoUrl": format!("{id}/sheets/Dashboard"),
        "defaultViewName": "Dashboard",
        "showInProfile": true,
        "viewCount": views,
        "numberOfFavorites": favorites,
        "permalink": null,
        "firstPublishDate": 1_577_836_800_000i64,
        "lastPublishDate": last_published,
        "revision": "1.0",
        "size": 4096
    })
}

/// Mount the profile endpoint
#[allow(dead_code)]
pub async fn mount_profile(server: &MockServer, profile_id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/profile/api/{profile_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount one listing page at offset `start`
#[allow(dead_code)]
pub async fn mount_listing_page(
    server: &MockServer,
    profile_id: &str,
    start: u32,
    contents: Vec<Value>,
    next: Value,
) {
    Mock::given(method("GET"))
        .and(path("/public/apis/workbooks"))
        .and(query_param("profileName", profile_id))
        .and(query_param("start", start.to_string()))
        .and(query_param("visibility", "NON_HIDDEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contents": contents,
            "next": next,
        })))
        .mount(server)
        .await;
}

/// Registry sheet rows: header plus `[email, first, last, profile, destination, refreshed]`
#[allow(dead_code)]
pub fn registry_rows(entries: &[[&str; 6]]) -> Vec<Vec<String>> {
    let mut rows = vec![[
        "Timestamp",
        "Email Address",
        "First Name",
        "Last Name",
        "Profile ID",
        "Stats Sheet",
        "Last Refreshed",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect::<Vec<_>>()];

    for entry in entries {
        let mut row = vec!["2024-01-01 00:00:00".to_string()];
        row.extend(entry.iter().map(|s| s.to_string()));
        rows.push(row);
    }
    rows
}

/// Configuration pointed at a mock upstream
#[allow(dead_code)]
pub fn test_config(upstream: &str) -> Config {
    let mut config = Config::default();
    config.upstream.base_url = upstream.to_string();
    config.upstream.site_url = "https://public.example.com".to_string();
    config.upstream.requests_per_second = 100;
    config.upstream.request_timeout_secs = 5;
    config.sync.operator_email = "ops@example.com".to_string();
    config.summary.cooldown_secs = 0;
    config.notifications.service_name = "Stats Service".to_string();
    config
}

/// Notifier that keeps every message in memory
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    operator: Mutex<Vec<(String, String)>>,
    welcomes: Mutex<Vec<(String, String, String)>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn operator_messages(&self) -> Vec<(String, String)> {
        self.operator.lock().unwrap().clone()
    }

    pub fn welcomes(&self) -> Vec<(String, String, String)> {
        self.welcomes.lock().unwrap().clone()
    }

    pub fn operator_subjects(&self) -> Vec<String> {
        self.operator_messages().into_iter().map(|(s, _)| s).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_operator(&self, subject: &str, body: &str) {
        self.operator
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
    }

    async fn notify_subscriber(&self, recipient: &str, first_name: &str, destination: &str) {
        self.welcomes.lock().unwrap().push((
            recipient.to_string(),
            first_name.to_string(),
            destination.to_string(),
        ));
    }
}

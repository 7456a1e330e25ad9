//! Google Sheets backend
//!
//! Talks to the Sheets v4 API for workbook and value operations and to the
//! Drive v3 API for sharing. Auth is an OAuth2 access token sent as a
//! bearer; obtaining that token happens outside this crate.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::{
    parse_workbook_id, workbook_url, AccessRole, SheetInfo, SheetLayout, SheetsBackend,
    StoreResult, Workbook,
};
use crate::config::SheetsConfig;
use crate::models::CellValue;
use crate::utils::error::StoreError;
use crate::utils::{a1_cell, a1_range};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetResponse {
    spreadsheet_id: String,
    spreadsheet_url: Option<String>,
    #[serde(default)]
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetEnvelope>,
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetEnvelope {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl From<SpreadsheetResponse> for Workbook {
    fn from(resp: SpreadsheetResponse) -> Self {
        let url = workbook_url(&resp.spreadsheet_id);
        Self {
            url,
            title: resp.properties.title,
            sheets: resp
                .sheets
                .into_iter()
                .map(|s| SheetInfo {
                    sheet_id: s.properties.sheet_id,
                    title: s.properties.title,
                    index: s.properties.index,
                })
                .collect(),
            id: resp.spreadsheet_id,
        }
    }
}

/// Sheets/Drive HTTP client
pub struct GoogleSheetsClient {
    client: Client,
    api_base: Url,
    drive_base: Url,
    token: String,
}

impl GoogleSheetsClient {
    /// Create a client from the sheets section of the configuration
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidReference` for unparsable API roots and
    /// `StoreError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &SheetsConfig) -> StoreResult<Self> {
        Self::new(
            &config.api_base,
            &config.drive_base,
            &config.access_token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Create a client against explicit API roots (mock servers in tests)
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidReference` for unparsable API roots and
    /// `StoreError::Http` if the HTTP client cannot be created
    pub fn new(
        api_base: &str,
        drive_base: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let parse = |base: &str| {
            Url::parse(base.trim_end_matches('/'))
                .map_err(|e| StoreError::InvalidReference(format!("{base}: {e}")))
        };

        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        Ok(Self {
            client,
            api_base: parse(api_base)?,
            drive_base: parse(drive_base)?,
            token: token.into(),
        })
    }

    /// Append path segments to a root, percent-encoding each one
    fn endpoint(base: &Url, segments: &[&str]) -> StoreResult<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidReference(base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.token)
    }

    /// Send a request and decode a JSON body, mapping error statuses
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        not_found: &str,
    ) -> StoreResult<T> {
        let response = request.send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Err(StoreError::NotFound(not_found.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    fn values_url(&self, workbook: &Workbook, range: &str, suffix: &str) -> StoreResult<Url> {
        let range_segment = format!("{range}{suffix}");
        Self::endpoint(
            &self.api_base,
            &["spreadsheets", &workbook.id, "values", &range_segment],
        )
    }

    /// Build the batchUpdate requests for a layout
    fn layout_requests(sheet: &SheetInfo, layout: &SheetLayout) -> Vec<serde_json::Value> {
        let mut requests = Vec::new();

        if layout.top_align && layout.rows > 0 && layout.columns > 0 {
            requests.push(json!({
                "repeatCell": {
                    "range": {
                        "sheetId": sheet.sheet_id,
                        "startRowIndex": 0,
                        "endRowIndex": layout.rows,
                        "startColumnIndex": 0,
                        "endColumnIndex": layout.columns,
                    },
                    "cell": { "userEnteredFormat": { "verticalAlignment": "TOP" } },
                    "fields": "userEnteredFormat.verticalAlignment",
                }
            }));
        }

        if layout.bold_header && layout.columns > 0 {
            requests.push(json!({
                "repeatCell": {
                    "range": {
                        "sheetId": sheet.sheet_id,
                        "startRowIndex": 0,
                        "endRowIndex": 1,
                        "startColumnIndex": 0,
                        "endColumnIndex": layout.columns,
                    },
                    "cell": { "userEnteredFormat": { "textFormat": { "bold": true } } },
                    "fields": "userEnteredFormat.textFormat.bold",
                }
            }));
        }

        let mut properties = json!({
            "sheetId": sheet.sheet_id,
            "gridProperties": { "frozenRowCount": layout.frozen_rows },
        });
        let mut fields = vec!["gridProperties.frozenRowCount"];
        if let Some(title) = &layout.title {
            properties["title"] = json!(title);
            fields.push("title");
        }
        requests.push(json!({
            "updateSheetProperties": {
                "properties": properties,
                "fields": fields.join(","),
            }
        }));

        requests
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(true) => String::from("TRUE"),
        serde_json::Value::Bool(false) => String::from("FALSE"),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetsBackend for GoogleSheetsClient {
    fn name(&self) -> &str {
        "google-sheets"
    }

    async fn open(&self, reference: &str) -> StoreResult<Workbook> {
        let id = parse_workbook_id(reference)?;
        let mut url = Self::endpoint(&self.api_base, &["spreadsheets", &id])?;
        url.query_pairs_mut()
            .append_pair("fields", "spreadsheetId,spreadsheetUrl,properties.title,sheets.properties");

        let resp: SpreadsheetResponse = match self
            .send_json(self.request(Method::GET, url), reference)
            .await
        {
            // A workbook that was unshared looks the same as a deleted one.
            Err(StoreError::Status { status: 403, .. }) => {
                return Err(StoreError::NotFound(reference.to_string()))
            }
            other => other?,
        };

        tracing::debug!(workbook = %resp.spreadsheet_id, url = ?resp.spreadsheet_url, "Opened workbook");
        Ok(resp.into())
    }

    async fn create(&self, title: &str) -> StoreResult<Workbook> {
        let url = Self::endpoint(&self.api_base, &["spreadsheets"])?;
        let body = json!({ "properties": { "title": title } });

        let resp: SpreadsheetResponse = self
            .send_json(self.request(Method::POST, url).json(&body), title)
            .await?;

        tracing::info!(workbook = %resp.spreadsheet_id, title, "Created workbook");
        Ok(resp.into())
    }

    async fn grant_access(
        &self,
        workbook: &Workbook,
        email: &str,
        role: AccessRole,
    ) -> StoreResult<()> {
        let mut url = Self::endpoint(&self.drive_base, &["files", &workbook.id, "permissions"])?;
        url.query_pairs_mut()
            .append_pair("sendNotificationEmail", "false");
        let body = json!({
            "type": "user",
            "role": role.as_str(),
            "emailAddress": email,
        });

        let _: serde_json::Value = self
            .send_json(self.request(Method::POST, url).json(&body), &workbook.id)
            .await?;

        tracing::debug!(workbook = %workbook.id, email, %role, "Granted access");
        Ok(())
    }

    async fn read_rows(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
    ) -> StoreResult<Vec<Vec<String>>> {
        let range = format!("'{}'", sheet.title.replace('\'', "''"));
        let url = self.values_url(workbook, &range, "")?;

        let resp: ValueRangeResponse = self
            .send_json(self.request(Method::GET, url), &workbook.id)
            .await?;

        Ok(resp
            .values
            .iter()
            .map(|row| row.iter().map(display_value).collect())
            .collect())
    }

    async fn clear(&self, workbook: &Workbook, sheet: &SheetInfo) -> StoreResult<()> {
        let range = format!("'{}'", sheet.title.replace('\'', "''"));
        let url = self.values_url(workbook, &range, ":clear")?;

        let _: serde_json::Value = self
            .send_json(self.request(Method::POST, url).json(&json!({})), &workbook.id)
            .await?;
        Ok(())
    }

    async fn write_rows(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
        start_row: usize,
        rows: &[Vec<CellValue>],
    ) -> StoreResult<()> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if rows.is_empty() || width == 0 {
            return Ok(());
        }

        let range = a1_range(&sheet.title, start_row, 1, start_row + rows.len() - 1, width);
        let mut url = self.values_url(workbook, &range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let values: Vec<Vec<serde_json::Value>> = rows
            .iter()
            .map(|row| row.iter().map(CellValue::to_json).collect())
            .collect();
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });

        let _: serde_json::Value = self
            .send_json(self.request(Method::PUT, url).json(&body), &workbook.id)
            .await?;

        tracing::debug!(workbook = %workbook.id, range = %range, rows = rows.len(), "Wrote rows");
        Ok(())
    }

    async fn update_cell(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
        row: usize,
        column: usize,
        value: &CellValue,
    ) -> StoreResult<()> {
        let range = a1_cell(&sheet.title, row, column);
        let mut url = self.values_url(workbook, &range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value.to_json()]],
        });

        let _: serde_json::Value = self
            .send_json(self.request(Method::PUT, url).json(&body), &workbook.id)
            .await?;
        Ok(())
    }

    async fn apply_layout(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
        layout: &SheetLayout,
    ) -> StoreResult<()> {
        let batch_segment = format!("{}:batchUpdate", workbook.id);
        let url = Self::endpoint(&self.api_base, &["spreadsheets", &batch_segment])?;
        let body = json!({ "requests": Self::layout_requests(sheet, layout) });

        let _: serde_json::Value = self
            .send_json(self.request(Method::POST, url).json(&body), &workbook.id)
            .await?;
        Ok(())
    }
}

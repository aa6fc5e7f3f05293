//! Spreadsheet mirror of the catalog.
//!
//! Row `id + 1` of the sheet holds catalog entry `id`; row 1 is the header.
//! Writes go through the mirror outbox, so nothing here is on the request
//! path and failures only delay the mirror.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, info, warn};

use crate::cards::title_case;
use crate::config::Mirror;
use crate::model::CatalogEntry;
use crate::sheets::model::{ClearValuesResponse, UpdateValuesResponse};

pub mod model;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/";

pub const HEADER: [&str; 6] = ["id", "Name", "category", "Region", "status", "reason"];

#[async_trait]
pub trait SheetMirror: Send + Sync {
    async fn push_entry(&self, entry: &CatalogEntry) -> Result<()>;
    async fn clear_entry(&self, id: i64) -> Result<()>;
    /// Overwrite the whole sheet with `entries`.
    async fn replace_all(&self, entries: &[CatalogEntry]) -> Result<()>;
}

/// Mirror used when no spreadsheet is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMirror;

#[async_trait]
impl SheetMirror for DisabledMirror {
    async fn push_entry(&self, entry: &CatalogEntry) -> Result<()> {
        debug!(id = entry.id, "mirror disabled; dropping push");
        Ok(())
    }

    async fn clear_entry(&self, id: i64) -> Result<()> {
        debug!(id, "mirror disabled; dropping clear");
        Ok(())
    }

    async fn replace_all(&self, entries: &[CatalogEntry]) -> Result<()> {
        debug!(count = entries.len(), "mirror disabled; dropping export");
        Ok(())
    }
}

#[derive(Clone)]
pub struct SheetsClient {
    http: Client,
    base_url: Url,
    token: String,
    spreadsheet_id: String,
    sheet_name: String,
}

impl fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsClient")
            .field("base_url", &self.base_url)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheet_name", &self.sheet_name)
            .finish_non_exhaustive()
    }
}

impl SheetsClient {
    pub fn from_config(cfg: &Mirror) -> Result<Self> {
        let base = cfg.base_url.as_deref().unwrap_or(SHEETS_API_BASE);
        let base_url = Url::parse(base).with_context(|| format!("invalid mirror base url {base}"))?;
        let http = Client::builder()
            .user_agent("celebcheck/0.1")
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            token: cfg.access_token.clone(),
            spreadsheet_id: cfg.spreadsheet_id.clone(),
            sheet_name: cfg.sheet_name.clone(),
        })
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("mirror base url cannot be a base"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    /// PUT `values/{range}?valueInputOption=RAW` with `rows`.
    pub fn build_update_request(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<reqwest::Request> {
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = build_values_body(range, rows);
        self.authorized(Method::PUT, url)
            .json(&body)
            .build()
            .context("failed to build sheets update request")
    }

    /// POST `values/{range}:clear`.
    pub fn build_clear_request(&self, range: &str) -> Result<reqwest::Request> {
        let url = self.values_url(range, ":clear")?;
        self.authorized(Method::POST, url)
            .json(&json!({}))
            .build()
            .context("failed to build sheets clear request")
    }

    fn authorized(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::Request) -> Result<T> {
        debug!(method = %request.method(), url = %request.url(), "sheets request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Google Sheets")?;
        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("rate limited by Google Sheets: {}", body);
            return Err(anyhow!("received 429 from Google Sheets: {}", body));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "Google Sheets error: {}", body);
            return Err(anyhow!("sheets error {}: {}", status, body));
        }
        res.json::<T>()
            .await
            .context("invalid Google Sheets response JSON")
    }
}

#[async_trait]
impl SheetMirror for SheetsClient {
    async fn push_entry(&self, entry: &CatalogEntry) -> Result<()> {
        let range = row_range(&self.sheet_name, sheet_row(entry.id));
        let request = self.build_update_request(&range, vec![entry_row(entry)])?;
        let resp: UpdateValuesResponse = self.execute(request).await?;
        info!(id = entry.id, range = ?resp.updated_range, "mirrored entry");
        Ok(())
    }

    async fn clear_entry(&self, id: i64) -> Result<()> {
        let range = row_range(&self.sheet_name, sheet_row(id));
        let request = self.build_clear_request(&range)?;
        let resp: ClearValuesResponse = self.execute(request).await?;
        info!(id, range = ?resp.cleared_range, "cleared mirrored entry");
        Ok(())
    }

    async fn replace_all(&self, entries: &[CatalogEntry]) -> Result<()> {
        let whole = format!("{}!A:F", quote_sheet(&self.sheet_name));
        let _: ClearValuesResponse = self.execute(self.build_clear_request(&whole)?).await?;

        let rows = sheet_grid(entries);
        let range = format!(
            "{}!A1:F{}",
            quote_sheet(&self.sheet_name),
            rows.len()
        );
        let resp: UpdateValuesResponse = self
            .execute(self.build_update_request(&range, rows)?)
            .await?;
        info!(
            spreadsheet = %resp.spreadsheet_id,
            rows = ?resp.updated_rows,
            "replaced mirrored catalog"
        );
        Ok(())
    }
}

pub fn sheet_row(id: i64) -> i64 {
    id + 1
}

fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

pub fn row_range(sheet: &str, row: i64) -> String {
    format!("{}!A{row}:F{row}", quote_sheet(sheet))
}

pub fn entry_row(entry: &CatalogEntry) -> Vec<Value> {
    vec![
        json!(entry.id),
        json!(title_case(&entry.name)),
        json!(entry.category),
        json!(title_case(&entry.region)),
        json!(entry.status.as_str()),
        json!(entry.reason.clone().unwrap_or_default()),
    ]
}

/// Header followed by one row per id; ids without an entry get a blank row
/// so every entry lands on row `id + 1`.
pub fn sheet_grid(entries: &[CatalogEntry]) -> Vec<Vec<Value>> {
    let mut rows = vec![HEADER.iter().map(|h| json!(h)).collect::<Vec<_>>()];
    let mut sorted: Vec<&CatalogEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.id);
    for entry in sorted {
        while (rows.len() as i64) < sheet_row(entry.id) - 1 {
            rows.push(vec![json!(""); HEADER.len()]);
        }
        rows.push(entry_row(entry));
    }
    rows
}

pub fn build_values_body(range: &str, rows: Vec<Vec<Value>>) -> Value {
    json!({
        "range": range,
        "majorDimension": "ROWS",
        "values": rows,
    })
}

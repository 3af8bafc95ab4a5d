// reportkeeper/src/feature_service.rs
//! Blocking REST client for ArcGIS-style hosted feature services.
//!
//! `Portal` acquires a token once per run; `FeatureLayer` implements the core
//! `RecordStore` contract on top of the layer's REST endpoint: paginated
//! attribute queries, spatial intersection queries (intersection semantics
//! stay on the server), and batched `applyEdits` submissions with per-record
//! outcomes.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use reportkeeper_core::records::{EditOutcome, Record, RecordStore, StoreOpener};

/// Page size used when a layer does not report a usable maxRecordCount.
const DEFAULT_PAGE_SIZE: u64 = 1000;

#[derive(Error, Debug)]
pub enum FeatureServiceError {
    #[error("Token request rejected: {0}")]
    TokenRejected(String),

    #[error("Service error {code}: {message}")]
    Service { code: i64, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Returns the service-level error carried in an otherwise-200 response, if
/// any. Feature services report failures in the JSON body, not the status.
fn check_service_error(response: &Value) -> Result<(), FeatureServiceError> {
    if let Some(error) = response.get("error") {
        return Err(FeatureServiceError::Service {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    Ok(())
}

/// An authenticated connection to the portal hosting the feature services.
pub struct Portal {
    client: Client,
    token: Option<String>,
}

impl Portal {
    /// Connects to the portal. An empty username skips token acquisition,
    /// which is enough for public services.
    pub fn connect(url: &str, username: &str, password: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("reportkeeper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let token = if username.is_empty() {
            debug!("No portal username configured; proceeding unauthenticated.");
            None
        } else {
            Some(Self::generate_token(&client, url, username, password)?)
        };
        Ok(Self { client, token })
    }

    fn generate_token(client: &Client, url: &str, username: &str, password: &str) -> Result<String> {
        let endpoint = format!("{}/sharing/rest/generateToken", url.trim_end_matches('/'));
        let response: Value = client
            .post(&endpoint)
            .form(&[
                ("username", username),
                ("password", password),
                ("referer", "reportkeeper"),
                ("expiration", "60"),
                ("f", "json"),
            ])
            .send()?
            .error_for_status()?
            .json()
            .with_context(|| format!("Token endpoint {} returned malformed JSON", endpoint))?;

        if let Some(error) = response.get("error") {
            return Err(FeatureServiceError::TokenRejected(error.to_string()).into());
        }
        match response.get("token").and_then(Value::as_str) {
            Some(token) => {
                debug!("Acquired portal token from {}", endpoint);
                Ok(token.to_string())
            }
            None => Err(FeatureServiceError::TokenRejected(
                "no token in response".to_string(),
            )
            .into()),
        }
    }

    /// Opens a layer, fetching its metadata once.
    pub fn layer(&self, url: &str) -> Result<FeatureLayer> {
        FeatureLayer::open(self, url)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    features: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct ApplyEditsResponse {
    #[serde(default, rename = "updateResults")]
    update_results: Vec<UpdateResult>,
}

#[derive(Debug, Deserialize)]
struct UpdateResult {
    #[serde(default, rename = "objectId")]
    object_id: i64,
    #[serde(default)]
    success: bool,
    error: Option<UpdateError>,
}

#[derive(Debug, Deserialize)]
struct UpdateError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    description: String,
}

/// One feature-service layer, implementing the core `RecordStore` contract.
pub struct FeatureLayer {
    client: Client,
    token: Option<String>,
    url: String,
    max_record_count: u64,
    date_fields: Vec<String>,
    /// Spatial reference of the layer, passed as inSR on spatial queries.
    wkid: Option<i64>,
}

impl FeatureLayer {
    fn open(portal: &Portal, url: &str) -> Result<Self> {
        let mut params: Vec<(&str, String)> = vec![("f", "json".to_string())];
        if let Some(token) = &portal.token {
            params.push(("token", token.clone()));
        }
        let metadata: Value = portal
            .client
            .get(url)
            .query(&params)
            .send()?
            .error_for_status()?
            .json()
            .with_context(|| format!("Layer {} returned malformed JSON metadata", url))?;
        check_service_error(&metadata)?;

        let max_record_count = metadata
            .get("maxRecordCount")
            .and_then(Value::as_u64)
            .filter(|count| *count >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let date_fields = metadata
            .get("fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|field| {
                        field
                            .get("type")
                            .and_then(Value::as_str)
                            .is_some_and(|t| t.contains("Date"))
                    })
                    .filter_map(|field| field.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let wkid = metadata.pointer("/extent/spatialReference/wkid").and_then(Value::as_i64);
        if wkid.is_none() {
            debug!("Layer {} reports no spatial reference", url);
        }

        Ok(Self {
            client: portal.client.clone(),
            token: portal.token.clone(),
            url: url.trim_end_matches('/').to_string(),
            max_record_count,
            date_fields,
            wkid,
        })
    }

    /// POSTs to a layer operation endpoint and parses the JSON body,
    /// surfacing service-level errors.
    fn request(&self, operation: &str, params: Vec<(&str, String)>) -> Result<Value> {
        let endpoint = format!("{}/{}", self.url, operation);
        let mut form = params;
        form.push(("f", "json".to_string()));
        if let Some(token) = &self.token {
            form.push(("token", token.clone()));
        }

        let response: Value = self
            .client
            .post(&endpoint)
            .form(&form)
            .send()?
            .error_for_status()?
            .json()
            .with_context(|| format!("{} returned malformed JSON", endpoint))?;
        check_service_error(&response)?;
        Ok(response)
    }

    /// Pages through a query until the service returns a short page.
    fn query_paged(&self, mut base_params: Vec<(&str, String)>) -> Result<Vec<Record>> {
        base_params.push(("outFields", "*".to_string()));
        let mut all = Vec::new();
        let mut offset: u64 = 0;
        loop {
            let mut params = base_params.clone();
            params.push(("resultOffset", offset.to_string()));
            params.push(("resultRecordCount", self.max_record_count.to_string()));

            let response = self.request("query", params)?;
            let page: QueryResponse = serde_json::from_value(response)
                .with_context(|| format!("{}/query returned an unexpected shape", self.url))?;

            let fetched = page.features.len() as u64;
            all.extend(page.features);
            if fetched < self.max_record_count {
                break;
            }
            offset += fetched;
        }
        debug!("Query against {} returned {} record(s)", self.url, all.len());
        Ok(all)
    }
}

impl RecordStore for FeatureLayer {
    fn query(&self, where_clause: &str) -> Result<Vec<Record>> {
        let where_clause = if where_clause.is_empty() { "1=1" } else { where_clause };
        self.query_paged(vec![
            ("where", where_clause.to_string()),
            ("returnGeometry", "false".to_string()),
        ])
    }

    fn query_intersecting(&self, geometry: &Value, where_clause: &str) -> Result<Vec<Record>> {
        let where_clause = if where_clause.is_empty() { "1=1" } else { where_clause };
        let mut params = vec![
            ("where", where_clause.to_string()),
            ("geometry", serde_json::to_string(geometry)?),
            ("geometryType", "esriGeometryPolygon".to_string()),
            ("spatialRel", "esriSpatialRelIntersects".to_string()),
            ("returnGeometry", "false".to_string()),
        ];
        if let Some(wkid) = self.wkid {
            params.push(("inSR", wkid.to_string()));
        }
        self.query_paged(params)
    }

    fn apply_edits(&self, updates: &[Record]) -> Result<Vec<EditOutcome>> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        let features = serde_json::to_string(updates)?;
        let response = self.request("applyEdits", vec![("updates", features)])?;
        let parsed: ApplyEditsResponse = serde_json::from_value(response)
            .with_context(|| format!("{}/applyEdits returned an unexpected shape", self.url))?;

        if parsed.update_results.len() != updates.len() {
            warn!(
                "{} reported {} outcome(s) for {} submitted record(s)",
                self.url,
                parsed.update_results.len(),
                updates.len()
            );
        }

        Ok(parsed
            .update_results
            .into_iter()
            .map(|result| EditOutcome {
                object_id: result.object_id,
                success: result.success,
                error_code: result.error.as_ref().map(|e| e.code),
                error_message: result.error.map(|e| e.description),
            })
            .collect())
    }

    fn date_fields(&self) -> Vec<String> {
        self.date_fields.clone()
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Opens `FeatureLayer`s through one authenticated portal connection.
pub struct PortalOpener<'a> {
    portal: &'a Portal,
}

impl<'a> PortalOpener<'a> {
    pub fn new(portal: &'a Portal) -> Self {
        Self { portal }
    }
}

impl StoreOpener for PortalOpener<'_> {
    fn open(&self, url: &str) -> Result<Box<dyn RecordStore>> {
        Ok(Box::new(self.portal.layer(url)?))
    }
}

//! Remote content source: paginated GraphQL queries, title lookups and media
//! downloads, all issued through the [`RetryPolicy`].

use crate::auth::TokenProvider;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::types::{ContentItem, NodeId, PropertyMap, PropertyValue};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Read access to the content API
///
/// The exporter only talks to the API through this trait so that the
/// pipeline can be exercised against an in-memory source.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Run a page query and return its rows.
    ///
    /// An `Err` means the page could not be obtained; callers treat it as
    /// "no more data".
    async fn fetch_page(&self, query: &str) -> Result<Vec<ContentItem>>;

    /// Look up display names for `ids` in a single round trip.
    ///
    /// Never fails: on any error the map is empty (or partial), and missing
    /// ids are simply absent.
    async fn fetch_titles(&self, ids: &[NodeId]) -> HashMap<NodeId, String>;

    /// Download a media file. Writing the bytes is the caller's job.
    async fn download_file(&self, url: &str) -> Result<Vec<u8>>;
}

// GraphQL envelope: { data: { content: { byQueryText: { data: [...] } } } }
// Missing or null levels deserialize to None.

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    #[serde(alias = "Data")]
    data: Option<ContentField<T>>,
    #[serde(alias = "Errors")]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct ContentField<T> {
    #[serde(alias = "Content")]
    content: Option<ByQueryTextField<T>>,
}

#[derive(Debug, Deserialize)]
struct ByQueryTextField<T> {
    #[serde(rename = "byQueryText", alias = "ByQueryText")]
    by_query_text: Option<QueryResult<T>>,
}

#[derive(Debug, Deserialize)]
struct QueryResult<T> {
    #[serde(alias = "Data")]
    data: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

impl<T> GraphQlResponse<T> {
    fn into_rows(self) -> Option<Vec<T>> {
        self.data?.content?.by_query_text?.data
    }
}

#[derive(Debug, Deserialize)]
struct ContentRow {
    #[serde(alias = "Id")]
    id: i64,
    #[serde(default, rename = "nodeName", alias = "NodeName")]
    node_name: Option<String>,
    #[serde(default, alias = "Path")]
    path: Option<String>,
    #[serde(default, alias = "Properties")]
    properties: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TitleRow {
    #[serde(alias = "Id")]
    id: i64,
    #[serde(default, rename = "nodeName", alias = "NodeName")]
    node_name: Option<String>,
}

impl From<ContentRow> for ContentItem {
    fn from(row: ContentRow) -> Self {
        ContentItem {
            id: NodeId(row.id),
            node_name: row.node_name.unwrap_or_default(),
            path: split_path(row.path.as_deref()),
            properties: lower_properties(&row.properties),
        }
    }
}

/// Split a comma-joined ancestor path into its segments
pub fn split_path(path: Option<&str>) -> Vec<String> {
    match path.map(str::trim) {
        None | Some("") => Vec::new(),
        Some(path) => path.split(',').map(|s| s.trim().to_string()).collect(),
    }
}

/// Lower a dynamic JSON properties object into a [`PropertyMap`].
///
/// Anything other than an object (including `null`) yields an empty map.
pub fn lower_properties(value: &serde_json::Value) -> PropertyMap {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), lower_value(value)))
            .collect(),
        _ => PropertyMap::new(),
    }
}

fn lower_value(value: &serde_json::Value) -> PropertyValue {
    match value {
        serde_json::Value::Object(_) => PropertyValue::Object(lower_properties(value)),
        serde_json::Value::Array(items) => {
            PropertyValue::Array(items.iter().map(lower_value).collect())
        }
        serde_json::Value::String(s) => PropertyValue::Scalar(s.clone()),
        serde_json::Value::Null => PropertyValue::Scalar(String::new()),
        other => PropertyValue::Scalar(other.to_string()),
    }
}

/// Build the single-round-trip title query for `ids`
pub fn titles_query(ids: &[NodeId]) -> String {
    let query_text = ids
        .iter()
        .map(|id| format!("id:{id}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "query GetNodeTitles {{ content {{ byQueryText(queryText: \"{query_text}\") {{ data {{ id nodeName }} }} }} }}"
    )
}

/// [`ContentSource`] backed by the GraphQL endpoint over HTTP
pub struct GraphQlSource {
    client: reqwest::Client,
    endpoint: Url,
    site_url: Url,
    tokens: Arc<TokenProvider>,
    retry: RetryPolicy,
}

impl GraphQlSource {
    /// Build a source (and its HTTP client) from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.api.request_timeout)
            .build()?;
        let tokens = Arc::new(TokenProvider::new(client.clone(), config.auth.clone()));

        Ok(Self {
            endpoint: config.graphql_endpoint()?,
            site_url: config.api.site_url.clone(),
            retry: RetryPolicy::new(config.retry.clone()),
            client,
            tokens,
        })
    }

    /// POST a GraphQL query through the retry policy and decode the rows
    async fn query_rows<T>(&self, query: &str) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = serde_json::json!({ "query": query });
        let body = &body;

        let response = self
            .retry
            .execute(move || async move {
                let token = self.tokens.access_token().await?;
                self.client
                    .post(self.endpoint.clone())
                    .bearer_auth(token)
                    .json(body)
                    .send()
                    .await
                    .map_err(Error::from)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: "GraphQL query failed".to_string(),
            });
        }

        let bytes = response.bytes().await?;
        let envelope: GraphQlResponse<T> = serde_json::from_slice(&bytes)
            .map_err(|e| Error::MalformedResponse(format!("invalid GraphQL response: {}", e)))?;

        if let Some(errors) = &envelope.errors {
            for error in errors {
                tracing::error!(message = %error.message, "GraphQL error reported by server");
            }
        }

        envelope.into_rows().ok_or_else(|| {
            Error::MalformedResponse("missing data.content.byQueryText.data".to_string())
        })
    }

    fn resolve_media_url(&self, url: &str) -> Result<Url> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(self.site_url.join(url)?),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ContentSource for GraphQlSource {
    async fn fetch_page(&self, query: &str) -> Result<Vec<ContentItem>> {
        match self.query_rows::<ContentRow>(query).await {
            Ok(rows) => Ok(rows.into_iter().map(ContentItem::from).collect()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch content items");
                Err(e)
            }
        }
    }

    async fn fetch_titles(&self, ids: &[NodeId]) -> HashMap<NodeId, String> {
        if ids.is_empty() {
            return HashMap::new();
        }

        match self.query_rows::<TitleRow>(&titles_query(ids)).await {
            Ok(rows) => rows
                .into_iter()
                .map(|row| (NodeId(row.id), row.node_name.unwrap_or_default()))
                .collect(),
            Err(e) => {
                let ids = ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
                tracing::error!(node_ids = %ids, error = %e, "Failed to fetch node titles");
                HashMap::new()
            }
        }
    }

    async fn download_file(&self, url: &str) -> Result<Vec<u8>> {
        let target = self.resolve_media_url(url)?;
        let target = &target;

        let response = self
            .retry
            .execute(move || async move {
                let token = self.tokens.access_token().await?;
                self.client
                    .get(target.clone())
                    .bearer_auth(token)
                    .send()
                    .await
                    .map_err(Error::from)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: format!("downloading {}", target),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

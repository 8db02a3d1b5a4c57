//! OMDb-compatible metadata provider

use crate::catalog::provider::{MetadataLookup, MetadataProvider};
use crate::error::Result;
use crate::types::{DisplayMetadata, ItemDetails};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_OMDB_BASE_URL: &str = "https://www.omdbapi.com/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw OMDb title response. Every field is optional on the wire.
#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Year", default)]
    year: String,
    #[serde(rename = "Plot", default)]
    plot: String,
    #[serde(rename = "Director", default)]
    director: String,
    #[serde(rename = "Poster", default)]
    poster: String,
    #[serde(rename = "Genre", default)]
    genre: String,
    #[serde(rename = "Actors", default)]
    actors: String,
    #[serde(rename = "imdbRating", default)]
    imdb_rating: String,
    #[serde(rename = "imdbID", default)]
    imdb_id: String,
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

/// HTTP client for an OMDb-style `?apikey=&t=` title lookup
pub struct OmdbMetadataProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OmdbMetadataProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl MetadataProvider for OmdbMetadataProvider {
    async fn lookup(&self, title: &str) -> Result<MetadataLookup> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("apikey", self.api_key.as_str()), ("t", title)])
            .send()
            .await
            .with_context(|| format!("OMDb request failed for '{}'", title))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("OMDb returned HTTP {} for '{}'", status, title));
        }

        let text = resp.text().await?;
        debug!("OMDb response - title: '{}', bytes: {}", title, text.len());
        parse_omdb_response(&text)
    }

    fn name(&self) -> &str {
        "omdb"
    }
}

/// Map an OMDb JSON body to a lookup answer
pub fn parse_omdb_response(text: &str) -> Result<MetadataLookup> {
    let response: OmdbResponse = serde_json::from_str(text).map_err(|e| {
        anyhow!(
            "Failed to parse OMDb response: {}. Response: {}",
            e,
            text.chars().take(200).collect::<String>()
        )
    })?;

    if response.response.eq_ignore_ascii_case("false") {
        let error = response.error.unwrap_or_default();
        // OMDb reports bad keys and rate limits through the same flag
        if error.to_lowercase().contains("not found") {
            return Ok(MetadataLookup::NotFound);
        }
        return Err(anyhow!("OMDb error: {}", error));
    }

    if response.title.is_empty() {
        return Ok(MetadataLookup::NotFound);
    }

    let external_id = if response.imdb_id.is_empty() {
        response.title.to_lowercase().replace(' ', "-")
    } else {
        response.imdb_id
    };

    Ok(MetadataLookup::Found(ItemDetails {
        title: response.title,
        external_id,
        metadata: DisplayMetadata {
            year: parse_year(&response.year),
            plot: response.plot,
            director: response.director,
            poster_url: response.poster,
            genre: response.genre,
            actors: response.actors,
            provider_rating: response.imdb_rating,
        },
    }))
}

/// Leading four digits of an OMDb year ("1979", "2008–2013")
fn parse_year(year: &str) -> Option<i32> {
    let digits: String = year.chars().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

//! Catalog sampling
//!
//! A [`CatalogSampler`] hands out uniformly random candidate titles. The
//! in-memory catalog is loaded from a plain list, a one-title-per-line file, or
//! the `Title` column of a CSV export.

use crate::error::{BattleError, Result};
use crate::random::{choose, SharedRandom};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Source of random candidate titles
#[async_trait]
pub trait CatalogSampler: Send + Sync {
    /// Uniformly random title from the full catalog
    async fn sample_title(&self) -> Result<String>;
}

/// Catalog held entirely in memory
pub struct InMemoryCatalog {
    titles: Vec<String>,
    random: SharedRandom,
}

impl std::fmt::Debug for InMemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCatalog")
            .field("titles", &self.titles.len())
            .finish()
    }
}

impl InMemoryCatalog {
    /// Build a catalog from titles. Blank entries and duplicates are dropped.
    pub fn new<I, S>(titles: I, random: SharedRandom) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let titles = titles
            .into_iter()
            .map(|t| t.into().trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        Self { titles, random }
    }

    /// Load titles from a file. A `.csv` file (or any file whose header row
    /// names a `Title` column) is read as CSV, anything else one title per line.
    pub fn from_file(path: &Path, random: SharedRandom) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;

        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        let titles = if is_csv || looks_like_csv_header(&content) {
            parse_titles_csv(&content)?
        } else {
            parse_titles_lines(&content)
        };

        debug!(
            "Loaded catalog - path: '{}', titles: {}",
            path.display(),
            titles.len()
        );
        Ok(Self::new(titles, random))
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

#[async_trait]
impl CatalogSampler for InMemoryCatalog {
    async fn sample_title(&self) -> Result<String> {
        choose(self.random.as_ref(), &self.titles)
            .cloned()
            .ok_or_else(|| BattleError::CatalogEmpty.into())
    }
}

fn looks_like_csv_header(content: &str) -> bool {
    content
        .lines()
        .next()
        .map(|header| {
            header
                .split(',')
                .any(|col| col.trim().trim_matches('"').eq_ignore_ascii_case("title"))
        })
        .unwrap_or(false)
}

/// One title per line, `#` comments and blank lines skipped
pub fn parse_titles_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Titles from the `Title` column of CSV content with a header row
pub fn parse_titles_csv(content: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers().context("Failed to read CSV header")?;
    let title_column = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("title"))
        .ok_or_else(|| anyhow!("CSV catalog has no Title column"))?;

    let mut titles = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping malformed catalog row: {}", e);
                continue;
            }
        };
        if let Some(title) = record.get(title_column) {
            let title = title.trim();
            if !title.is_empty() {
                titles.push(title.to_string());
            }
        }
    }

    Ok(titles)
}

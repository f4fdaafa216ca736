//! Google Places / Geocoding backed `Geocoder`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{Geocoder, PlaceSuggestion};
use crate::models::Coordinate;

const GOOGLE_MAPS_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

/// Geocoding calls are decorative (addresses, suggestions), so they fail fast.
const GEOCODER_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    description: String,
    place_id: String,
    structured_formatting: Option<StructuredFormatting>,
}

#[derive(Debug, Deserialize)]
struct StructuredFormatting {
    main_text: Option<String>,
    secondary_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

#[derive(Clone)]
pub struct GooglePlaces {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GooglePlaces {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(GOOGLE_MAPS_BASE_URL.to_string(), api_key)
    }

    pub fn with_base_url(base_url: String, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(GEOCODER_TIMEOUT_SECS))
            .build()
            .context("Failed to build geocoder HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn fetch_suggestions(&self, input: &str) -> Result<Vec<PlaceSuggestion>> {
        let url = format!("{}/place/autocomplete/json", self.base_url);
        let response: AutocompleteResponse = self
            .client
            .get(&url)
            .query(&[("input", input), ("key", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to send autocomplete request")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse autocomplete response")?;

        Ok(response
            .predictions
            .into_iter()
            .map(|p| {
                let formatting = p.structured_formatting;
                PlaceSuggestion {
                    main_text: formatting
                        .as_ref()
                        .and_then(|f| f.main_text.clone())
                        .unwrap_or_else(|| p.description.clone()),
                    secondary_text: formatting
                        .and_then(|f| f.secondary_text)
                        .unwrap_or_default(),
                    description: p.description,
                    place_id: p.place_id,
                }
            })
            .collect())
    }

    async fn reverse_geocode(&self, coords: Coordinate) -> Result<Option<String>> {
        let url = format!("{}/geocode/json", self.base_url);
        let latlng = format!("{},{}", coords.latitude, coords.longitude);
        let response: GeocodeResponse = self
            .client
            .get(&url)
            .query(&[("latlng", latlng.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to send geocode request")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse geocode response")?;

        Ok(response.results.into_iter().next().map(|r| r.formatted_address))
    }
}

#[async_trait]
impl Geocoder for GooglePlaces {
    async fn suggestions(&self, input: &str) -> Vec<PlaceSuggestion> {
        if input.trim().is_empty() {
            return Vec::new();
        }
        match self.fetch_suggestions(input).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                warn!(error = %e, "Place suggestions failed");
                Vec::new()
            }
        }
    }

    async fn address_for(&self, coords: Coordinate) -> Option<String> {
        match self.reverse_geocode(coords).await {
            Ok(address) => address,
            Err(e) => {
                warn!(error = %e, lat = coords.latitude, lng = coords.longitude, "Reverse geocoding failed");
                None
            }
        }
    }
}

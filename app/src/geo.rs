//! Location collaborators: geocoding, static map previews and device position.

use crate::model::{Coordinates, PlaceLocation};
use async_trait::async_trait;
use placebook_core::SyncError;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

const GOOGLE_MAPS_API: &str = "https://maps.googleapis.com/maps/api";

/// Turns coordinates into a human readable address
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Address at `at`, or `None` when nothing is known there
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged.
    async fn address(&self, at: Coordinates) -> Result<Option<String>, SyncError>;
}

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

/// Google Geocoding API
#[derive(Clone, Debug)]
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleGeocoder {
    /// Geocoder using `api_key`
    #[must_use]
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: GOOGLE_MAPS_API.to_string(),
        }
    }

    /// Point the geocoder at another host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    #[tracing::instrument(skip(self), fields(at = %at))]
    async fn address(&self, at: Coordinates) -> Result<Option<String>, SyncError> {
        let response = self
            .client
            .get(format!("{}/geocode/json", self.base_url))
            .query(&[("latlng", at.to_string()), ("key", self.api_key.clone())])
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        let geo: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| SyncError::InvalidResponse(e.to_string()))?;
        Ok(geo.results.into_iter().next().map(|result| result.formatted_address))
    }
}

/// Static map preview URLs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticMap {
    api_key: String,
    zoom: u8,
}

impl StaticMap {
    /// Zoom used when none is configured
    pub const DEFAULT_ZOOM: u8 = 14;

    /// Preview builder using `api_key`
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            zoom: Self::DEFAULT_ZOOM,
        }
    }

    /// Use `zoom` for every preview
    #[must_use]
    pub const fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    /// 500x300 roadmap centred on `at` with a red marker labelled "Place"
    #[must_use]
    pub fn url(&self, at: Coordinates) -> String {
        format!(
            "{GOOGLE_MAPS_API}/staticmap?center={at}&zoom={zoom}&size=500x300&maptype=roadmap\
             &markers=color:red%7Clabel:Place%7C{at}&key={key}",
            zoom = self.zoom,
            key = self.api_key,
        )
    }
}

/// Reports where the device is
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Current position
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::GeoUnavailable`] when no position can be had.
    async fn current_position(&self) -> Result<Coordinates, SyncError>;
}

/// A device without positioning
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGeolocation;

#[async_trait]
impl Geolocator for NoGeolocation {
    async fn current_position(&self) -> Result<Coordinates, SyncError> {
        Err(SyncError::GeoUnavailable("no positioning available".into()))
    }
}

/// A device that always reports the same position
#[derive(Clone, Copy, Debug)]
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl Geolocator for FixedPosition {
    async fn current_position(&self) -> Result<Coordinates, SyncError> {
        Ok(self.0)
    }
}

/// Builds a [`PlaceLocation`] from a picked or located point
#[derive(Clone)]
pub struct LocationPicker {
    geocoder: Arc<dyn Geocoder>,
    map: StaticMap,
    geolocator: Arc<dyn Geolocator>,
}

impl std::fmt::Debug for LocationPicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationPicker")
            .field("map", &self.map)
            .finish_non_exhaustive()
    }
}

impl LocationPicker {
    /// Picker over the given collaborators
    #[must_use]
    pub fn new(geocoder: Arc<dyn Geocoder>, map: StaticMap, geolocator: Arc<dyn Geolocator>) -> Self {
        Self {
            geocoder,
            map,
            geolocator,
        }
    }

    /// Location at `at` with its address and map preview
    ///
    /// # Errors
    ///
    /// Returns the geocoding failure unchanged.
    pub async fn pick(&self, at: Coordinates) -> Result<PlaceLocation, SyncError> {
        let address = self.geocoder.address(at).await?;
        Ok(PlaceLocation {
            lat: at.lat,
            lng: at.lng,
            address,
            static_map_image_url: Some(self.map.url(at)),
        })
    }

    /// Location of the device
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::GeoUnavailable`] without a position, otherwise
    /// whatever [`LocationPicker::pick`] returns.
    pub async fn locate_user(&self) -> Result<PlaceLocation, SyncError> {
        let at = self.geolocator.current_position().await?;
        self.pick(at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_map_url_centres_and_marks_the_point() {
        let url = StaticMap::new("k3y").url(Coordinates::new(40.5, -3.25));

        assert_eq!(
            url,
            "https://maps.googleapis.com/maps/api/staticmap?center=40.5,-3.25&zoom=14\
             &size=500x300&maptype=roadmap&markers=color:red%7Clabel:Place%7C40.5,-3.25&key=k3y"
        );
    }

    #[test]
    fn static_map_zoom_is_configurable() {
        let url = StaticMap::new("k").with_zoom(9).url(Coordinates::new(1.0, 2.0));
        assert!(url.contains("&zoom=9&"));
    }

    #[tokio::test]
    async fn device_without_positioning_is_unavailable() {
        let picker = LocationPicker::new(
            Arc::new(GoogleGeocoder::new(Client::new(), "k")),
            StaticMap::new("k"),
            Arc::new(NoGeolocation),
        );

        assert!(matches!(
            picker.locate_user().await,
            Err(SyncError::GeoUnavailable(_))
        ));
    }
}

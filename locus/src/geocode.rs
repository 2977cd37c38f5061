//! Geocoding collaborator contract.
//!
//! The manager starts a lookup when a geocode request begins running and
//! cancels it when the request stops. Results come back through
//! `LocationManager::on_geocode_result`.

use std::fmt;

use serde::Serialize;

use crate::request::RequestId;

/// Circular area used to bias forward geocoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

/// What to resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GeocodeQuery {
    /// Forward geocoding of a free-form address.
    Address { text: String, region: Option<Region> },
    /// Reverse geocoding of a coordinate.
    Coordinate { latitude: f64, longitude: f64 },
}

impl GeocodeQuery {
    pub fn address(text: impl Into<String>) -> Self {
        GeocodeQuery::Address {
            text: text.into(),
            region: None,
        }
    }

    pub fn coordinate(latitude: f64, longitude: f64) -> Self {
        GeocodeQuery::Coordinate {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for GeocodeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeocodeQuery::Address { text, .. } => write!(f, "address '{}'", text),
            GeocodeQuery::Coordinate {
                latitude,
                longitude,
            } => write!(f, "({:.5}, {:.5})", latitude, longitude),
        }
    }
}

/// A resolved place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placemark {
    pub name: Option<String>,
    pub locality: Option<String>,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Placemark {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            name: None,
            locality: None,
            country: None,
            latitude,
            longitude,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}

/// Network geocoding client.
///
/// Implementations must not call back into the manager synchronously; the
/// host reports completion through `on_geocode_result`.
pub trait Geocoder: Send {
    fn geocode(&mut self, id: RequestId, query: &GeocodeQuery);
    fn cancel(&mut self, id: RequestId);
}

/// Geocoder that never resolves anything.
#[derive(Debug, Default)]
pub struct NullGeocoder;

impl Geocoder for NullGeocoder {
    fn geocode(&mut self, id: RequestId, query: &GeocodeQuery) {
        tracing::debug!(request = %id, query = %query, "No geocoder configured, lookup dropped");
    }

    fn cancel(&mut self, _id: RequestId) {}
}

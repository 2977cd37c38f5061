//! Kind-partitioned store of registered requests.
//!
//! Requests live in one collection per kind, each kept in registration order
//! so the arbitrator's first-registered tie-break holds. An id is present in
//! at most one collection.

use crate::request::{Request, RequestId, RequestKind};
use crate::settings::Requirements;

#[derive(Debug, Default)]
pub struct Registry {
    locations: Vec<Request>,
    headings: Vec<Request>,
    geocodes: Vec<Request>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection_mut(&mut self, kind: &RequestKind) -> &mut Vec<Request> {
        match kind {
            RequestKind::Location(_) => &mut self.locations,
            RequestKind::Heading(_) => &mut self.headings,
            RequestKind::Geocode(_) => &mut self.geocodes,
        }
    }

    /// Adds a request. Returns false if the id is already registered.
    pub fn insert(&mut self, request: Request) -> bool {
        if self.contains(request.id()) {
            return false;
        }
        self.collection_mut(request.kind()).push(request);
        true
    }

    pub fn remove(&mut self, id: RequestId) -> Option<Request> {
        for collection in [&mut self.locations, &mut self.headings, &mut self.geocodes] {
            if let Some(pos) = collection.iter().position(|r| r.id() == id) {
                return Some(collection.remove(pos));
            }
        }
        None
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: RequestId) -> Option<&Request> {
        self.iter().find(|r| r.id() == id)
    }

    pub fn get_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        self.iter_mut().find(|r| r.id() == id)
    }

    /// All requests: locations, then headings, then geocodes.
    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.locations
            .iter()
            .chain(self.headings.iter())
            .chain(self.geocodes.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.locations
            .iter_mut()
            .chain(self.headings.iter_mut())
            .chain(self.geocodes.iter_mut())
    }

    pub fn locations(&self) -> impl Iterator<Item = &Request> {
        self.locations.iter()
    }

    pub fn locations_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.locations.iter_mut()
    }

    pub fn headings_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.headings.iter_mut()
    }

    pub fn geocodes_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.geocodes.iter_mut()
    }

    /// Requests that drive the location or heading sensor.
    pub fn sensor_requests_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.locations.iter_mut().chain(self.headings.iter_mut())
    }

    /// Requirements of running location requests, in registration order.
    pub fn running_requirements(&self) -> Vec<Requirements> {
        self.locations
            .iter()
            .filter(|r| r.is_running())
            .filter_map(|r| r.requirements().copied())
            .collect()
    }

    /// Heading filters of running heading requests.
    pub fn running_heading_filters(&self) -> Vec<f64> {
        self.headings
            .iter()
            .filter(|r| r.is_running())
            .filter_map(|r| r.heading_filter())
            .collect()
    }

    pub fn has_running_sensor_requests(&self) -> bool {
        self.locations
            .iter()
            .chain(self.headings.iter())
            .any(|r| r.is_running())
    }

    pub fn has_running_location_requests(&self) -> bool {
        self.locations.iter().any(|r| r.is_running())
    }

    pub fn has_running_background_location(&self) -> bool {
        self.locations
            .iter()
            .any(|r| r.is_running() && r.is_background())
    }

    pub fn ids(&self) -> Vec<RequestId> {
        self.iter().map(|r| r.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.locations.len() + self.headings.len() + self.geocodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Locus - shares one location sensor between many consumers.
//!
//! Apps usually have several independent features that want location data at
//! once: a map that needs 10 m fixes, a weather widget that is happy with
//! city-level changes, a compass. The sensor exposes a single configuration at
//! a time. Locus keeps a registry of those requests, derives the one
//! configuration that serves all of them, and fans sensor events back out.
//!
//! # Architecture
//!
//! ```text
//!  LocationService (tokio task)
//!        |
//!        v
//!  LocationManager ── Registry ── Request (Location | Heading | Geocode)
//!        |                |
//!        |          arbitrate() ──> ArbitratedSettings
//!        v
//!  HardwareAdapter ── reconcile() ──> HardwareCommand ──> LocationHardware
//!        ^
//!  AuthorizationGate, BackgroundBridge (HostRuntime), Geocoder, TimeoutScheduler
//! ```
//!
//! # Quick start
//!
//! ```
//! use locus::hardware::simulated::SimulatedHardware;
//! use locus::manager::LocationManager;
//! use locus::reading::Reading;
//! use locus::request::Request;
//! use locus::settings::{Accuracy, Frequency};
//!
//! let (hardware, log) = SimulatedHardware::new();
//! let mut manager = LocationManager::builder(hardware).build();
//!
//! let request = Request::location(Accuracy::HOUSE, Frequency::Continuous)
//!     .on_reading(|r| println!("{:.4}, {:.4}", r.latitude, r.longitude));
//! manager.register([request]);
//! assert!(log.sensor().continuous);
//!
//! manager.on_readings(&[Reading::new(52.52, 13.40, 8.0, chrono::Utc::now())]);
//! manager.shutdown();
//! assert!(!log.sensor().continuous);
//! ```

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod geocode;
pub mod hardware;
pub mod logging;
pub mod manager;
pub mod reading;
pub mod registry;
pub mod request;
pub mod service;
pub mod settings;
pub mod timer;

pub use auth::{AuthorizationLevel, AuthorizationStatus};
pub use background::{AppState, ExtensionToken, HostRuntime};
pub use error::LocationError;
pub use geocode::{GeocodeQuery, Geocoder, Placemark};
pub use hardware::LocationHardware;
pub use manager::{LocationManager, ManagerConfig, ManagerSnapshot};
pub use reading::{HeadingReading, Reading};
pub use request::{Request, RequestId, RequestState};
pub use service::{LocationService, ServiceError};
pub use settings::{Accuracy, ActivityHint, ArbitratedSettings, Frequency};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

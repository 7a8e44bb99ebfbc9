//! Data models for the SeaGuard service
//!
//! This module contains the transient request/response records organized by concern:
//! - Location: validated coordinates and distances
//! - Station: observation stations and selection results
//! - Tide: condensed tide series handed to the LLM
//! - Assessment: structured safety assessment
//! - Stream: incremental LLM output units

pub mod assessment;
pub mod location;
pub mod station;
pub mod stream;
pub mod tide;

// Re-export all public types for convenient access
pub use assessment::{DEFAULT_EMERGENCY_CONTACTS, RiskLevel, SafetyAssessment};
pub use location::Coordinate;
pub use station::{NearestStation, Station, StationInfo};
pub use stream::StreamChunk;
pub use tide::{Daylight, ObservationDigest, TideReading, TideStatistics, TideSummary, TideTrend};

//! Ocean observation flows
//!
//! - [`station_selector`]: nearest station by great-circle distance
//! - [`tide_summary`]: condenses raw tide series for prompting
//! - [`locator`]: station lookup plus observation fetch
//! - [`safety_guide`]: LLM-backed safety assessment

pub mod locator;
pub mod safety_guide;
pub mod station_selector;
pub mod tide_summary;

pub use locator::{TideLocator, TideLookup, TideQuery, parse_date};
pub use safety_guide::{SafetyGuide, SafetyGuideService, parse_assessment};
pub use station_selector::nearest_station;
pub use tide_summary::summarize;

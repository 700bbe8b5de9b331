//! Contact harvesting: pull emails, phone numbers and social profiles out of
//! websites, one URL at a time or as tracked batch jobs.

pub mod api;
#[cfg(feature = "browser")]
pub mod browser;
pub mod config;
pub mod decoders;
pub mod domain;
pub mod error;
pub mod export;
pub mod harvester;
pub mod history;
pub mod input;
pub mod jobs;
pub mod models;
pub mod patterns;
pub mod processor;
pub mod scraper;

pub use error::{AppError, Result};
pub use harvester::Harvester;
pub use models::{ExtractionResult, ScrapeStatus, ScrapeTarget, SocialPlatform};

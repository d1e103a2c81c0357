//! Shared domain model and pipeline components for Meteotrip.
//!
//! The trip-enrichment pipeline runs draft validation ([`draft`]), forecast
//! enrichment ([`forecast`]), admission control ([`quota`]) and persistence
//! ([`store`]), glued together by [`pipeline`]. The assistant side
//! ([`suggestions`], [`chat`]) never fails towards its caller: every
//! upstream problem degrades into deterministic fallback data.

pub mod auth;
pub mod chat;
pub mod dates;
pub mod draft;
pub mod error;
pub mod forecast;
pub mod gemini;
pub mod generative;
pub mod parse;
pub mod pipeline;
pub mod quota;
pub mod store;
pub mod suggestions;
pub mod trip;
pub mod weather_api;

//! Source adapters for the game update notifier.
//!
//! Each adapter implements [`notifier_core::traits::SourceAdapter`] for one
//! storefront or launcher and owns its own HTTP client.

pub mod cache;
pub mod hoyoplay;
pub mod http;
pub mod steam;

pub use hoyoplay::{HoYoPlayAdapter, Region, HOYOPLAY_KIND};
pub use http::build_client;
pub use steam::{SteamAdapter, STEAM_KIND};

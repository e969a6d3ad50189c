//! Route providers — where new routes come from.

use async_trait::async_trait;

use nav_core::{LonLat, NavError, Result, Route};

/// Asynchronous request/response route source. No retry policy here;
/// implementations retry if they want to.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Route from `origin` to `destination`.
    async fn request_route(&self, origin: LonLat, destination: LonLat) -> Result<Route>;
}

/// Provider for runs without network access. Every request fails, so a
/// reroute degrades the session to position display only.
#[derive(Debug, Default, Clone)]
pub struct OfflineProvider;

#[async_trait]
impl RouteProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn request_route(&self, _origin: LonLat, _destination: LonLat) -> Result<Route> {
        Err(NavError::Provider("offline, no route provider configured".into()))
    }
}

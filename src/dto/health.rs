use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of the storage ping performed by the health route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageHealth {
    Connected,
    Unreachable,
    /// No store has been installed yet.
    Missing,
}

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Result of pinging the storage backend.
    pub storage: StorageHealth,
    /// Games with a live controller session in this process.
    pub active_controllers: usize,
}

impl HealthResponse {
    /// Report `ok` only when storage is connected and not degraded.
    pub fn new(degraded: bool, storage: StorageHealth, active_controllers: usize) -> Self {
        let healthy = !degraded && storage == StorageHealth::Connected;
        Self {
            status: if healthy { "ok" } else { "degraded" }.to_string(),
            storage,
            active_controllers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_storage_reports_degraded() {
        assert_eq!(HealthResponse::new(false, StorageHealth::Connected, 2).status, "ok");
        assert_eq!(
            HealthResponse::new(false, StorageHealth::Unreachable, 0).status,
            "degraded"
        );
        assert_eq!(HealthResponse::new(true, StorageHealth::Missing, 0).status, "degraded");
    }
}

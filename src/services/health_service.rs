use tracing::warn;

use crate::{
    dto::health::{HealthResponse, StorageHealth},
    state::SharedState,
};

/// Ping the store and report the degraded flag alongside the result.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = match state.store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => StorageHealth::Connected,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                StorageHealth::Unreachable
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            StorageHealth::Missing
        }
    };

    HealthResponse::new(state.is_degraded(), storage, state.active_controllers())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::score_store::memory::MemoryScoreStore,
        services::auth_service::StaticTokenAuthenticator, state::AppState,
    };

    #[tokio::test]
    async fn reports_missing_store_then_connected_then_unreachable() {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(StaticTokenAuthenticator::default()),
        );
        let report = health_status(&state).await;
        assert_eq!(report.storage, StorageHealth::Missing);
        assert_eq!(report.status, "degraded");

        let store = MemoryScoreStore::new(state.feed().clone());
        state.set_store(Arc::new(store.clone())).await;
        let report = health_status(&state).await;
        assert_eq!(report.storage, StorageHealth::Connected);
        assert_eq!(report.status, "ok");

        store.set_online(false);
        let report = health_status(&state).await;
        assert_eq!(report.storage, StorageHealth::Unreachable);
        assert_eq!(report.status, "degraded");
    }
}

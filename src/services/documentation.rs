use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the scoreboard backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::admin::list_games,
        crate::routes::admin::create_game,
        crate::routes::admin::get_game,
        crate::routes::admin::update_game,
        crate::routes::admin::delete_game,
        crate::routes::control::apply_intent,
        crate::routes::control::current_state,
        crate::routes::control::resync,
        crate::routes::control::send_overlay,
        crate::routes::control::send_player_popup,
        crate::routes::public::get_game,
        crate::routes::sse::viewer_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::StorageHealth,
            crate::dto::game::GameInput,
            crate::dto::game::GameSummary,
            crate::dto::game::GameListItem,
            crate::dto::game::ScoreLine,
            crate::dto::control::LiveStateDto,
            crate::dto::control::ControllerStateResponse,
            crate::dto::control::OverlayUpdateRequest,
            crate::dto::control::PlayerPopupRequest,
            crate::dto::control::BroadcastResponse,
            crate::dto::public::PublicGameResponse,
            crate::dto::sse::ViewerSnapshot,
            crate::dto::sse::PlayerPopupEvent,
            crate::dto::sse::GameDeletedEvent,
            crate::state::engine::ScoreIntent,
            crate::state::overlay::OverlayDisplayState,
            crate::state::overlay::OverlayPosition,
            crate::state::overlay::PlayerRef,
            crate::state::scoreboard::TeamSide,
            crate::state::scoreboard::Base,
            crate::state::scoreboard::CountKind,
            crate::state::scoreboard::GameStatus,
            crate::state::scoreboard::TextTone,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "admin", description = "Game management for operators"),
        (name = "control", description = "Live scoreboard control"),
        (name = "public", description = "Read-only game projections"),
        (name = "sse", description = "Server-sent events streams for overlays"),
    )
)]
/// OpenAPI document covering every HTTP route.
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by operator routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/admin/games",
            "/admin/games/{id}",
            "/control/{id}/intents",
            "/control/{id}/popup",
            "/public/games/{id}",
            "/sse/games/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("bearer"));
    }
}

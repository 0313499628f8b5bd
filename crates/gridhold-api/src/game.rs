use axum::{Extension, Json, extract::State};
use tracing::{info, warn};

use gridhold_db::models::JoinOutcome;
use gridhold_types::api::{AckResponse, Claims, GameStatusResponse, JoinGameResponse};
use gridhold_types::events::{MapEvent, PointAction};
use gridhold_types::grid::GridPoint;

use crate::error::{ApiError, AuthRejection};
use crate::state::{AppState, run_db};

/// POST /api/game/join. Joining twice is not an error: the second call
/// reports `success: false` with the unchanged home.
pub async fn join_game(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<JoinGameResponse>, ApiError> {
    let id = claims.sub.to_string();
    let outcome = run_db(&state, move |db| db.join_game(&id)).await?;

    let response = match outcome {
        JoinOutcome::Joined { home, created } => {
            info!("{} joined the game at ({}, {})", claims.username, home.x, home.y);
            state.events.publish(MapEvent::BasePointsChanged {
                action: PointAction::Joined,
                user_id: Some(claims.sub.to_string()),
                count: usize::from(created),
            });
            JoinGameResponse {
                success: true,
                game_joined: true,
                home_x: home.x,
                home_y: home.y,
                message: format!("Joined the game. Your base is at ({}, {})", home.x, home.y),
            }
        }
        JoinOutcome::AlreadyJoined(home) => JoinGameResponse {
            success: false,
            game_joined: true,
            home_x: home.x,
            home_y: home.y,
            message: "You have already joined the game".into(),
        },
        JoinOutcome::UnknownUser => return Err(AuthRejection::UnknownUser.into()),
    };

    Ok(Json(response))
}

/// POST /api/game/leave. Base points stay where they are.
pub async fn leave_game(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<AckResponse>, ApiError> {
    let id = claims.sub.to_string();
    let updated = run_db(&state, move |db| db.leave_game(&id)).await?;
    if !updated {
        warn!("leave_game: no user row for {}", claims.sub);
    } else {
        info!("{} left the game", claims.username);
    }

    Ok(Json(AckResponse {
        success: true,
        message: "You left the game. Your base remains on the map.".into(),
    }))
}

/// GET /api/game/status. A missing user row reads as "not joined".
pub async fn game_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<GameStatusResponse>, ApiError> {
    let id = claims.sub.to_string();
    let game = run_db(&state, move |db| db.get_game_state(&id)).await?;

    let (joined, home) = game
        .map(|g| (g.joined, g.home))
        .unwrap_or((false, GridPoint::ORIGIN));

    Ok(Json(GameStatusResponse {
        success: true,
        game_joined: joined,
        home_x: home.x,
        home_y: home.y,
    }))
}

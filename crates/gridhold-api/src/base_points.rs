use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State, rejection::{JsonRejection, QueryRejection}},
};
use tracing::info;

use gridhold_types::api::{
    BasePointQuery, BasePointsResponse, CleanupLinesRequest, CleanupLinesResponse, Claims,
    DeletePointResponse, ResetPointsResponse, SavePointResponse,
};
use gridhold_types::events::{MapEvent, PointAction};
use gridhold_types::grid::{self, GridPoint};
use gridhold_types::models::BasePoint;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// GET /api/base-points — every stored point, or only those inside the
/// 41×41 box around `x`,`y`. Giving only one of them is a 400.
pub async fn list_base_points(
    State(state): State<AppState>,
    query: Result<Query<BasePointQuery>, QueryRejection>,
) -> Result<Json<BasePointsResponse>, ApiError> {
    let Query(query) = query?;
    let origin = query.origin().map_err(ApiError::validation)?;
    let points = run_db(&state, |db| db.all_base_points()).await?;

    Ok(Json(BasePointsResponse {
        base_points: visible_points(&points, origin),
    }))
}

/// GET /api/base-points/mine
pub async fn my_base_points(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<BasePointsResponse>, ApiError> {
    let id = claims.sub.to_string();
    let points = run_db(&state, move |db| db.base_points_for_user(&id)).await?;

    Ok(Json(BasePointsResponse {
        base_points: visible_points(&points, None),
    }))
}

/// POST /api/base-points/mine `{x, y}` — save a board position.
pub async fn save_base_point(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<GridPoint>, JsonRejection>,
) -> Result<Json<SavePointResponse>, ApiError> {
    let Json(at) = payload?;
    let id = claims.sub.to_string();
    let point = run_db(&state, move |db| db.save_base_point(&id, at.x, at.y)).await?;

    state.events.publish(MapEvent::BasePointsChanged {
        action: PointAction::Saved,
        user_id: Some(point.user_id.clone()),
        count: 1,
    });

    Ok(Json(SavePointResponse {
        success: true,
        base_point: point,
    }))
}

/// DELETE /api/base-points/mine `{x, y}`
pub async fn delete_base_point(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<GridPoint>, JsonRejection>,
) -> Result<Json<DeletePointResponse>, ApiError> {
    let Json(at) = payload?;
    let id = claims.sub.to_string();
    let deleted = run_db(&state, move |db| db.delete_base_point(&id, at.x, at.y)).await?;

    if deleted {
        state.events.publish(MapEvent::BasePointsChanged {
            action: PointAction::Deleted,
            user_id: Some(claims.sub.to_string()),
            count: 1,
        });
    }

    Ok(Json(DeletePointResponse {
        success: true,
        deleted,
    }))
}

/// POST /api/base-points/reset — development only. Drops all of the
/// caller's points.
pub async fn reset_base_points(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ResetPointsResponse>, ApiError> {
    if !state.environment.is_development() {
        return Err(ApiError::Forbidden("Reset is only available in development".into()));
    }

    let id = claims.sub.to_string();
    let deleted_count = run_db(&state, move |db| db.clear_base_points_for_user(&id)).await?;

    info!("Reset {} base points for {}", deleted_count, claims.username);
    state.events.publish(MapEvent::BasePointsChanged {
        action: PointAction::Reset,
        user_id: Some(claims.sub.to_string()),
        count: deleted_count,
    });

    Ok(Json(ResetPointsResponse {
        success: true,
        deleted_count,
    }))
}

/// POST /api/cleanup-lines — admins, or anyone in development.
///
/// Body is optional: `{slopes?, anchorX?, anchorY?}`. Without slopes a random
/// set containing slope 1 is drawn.
pub async fn cleanup_lines(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<Json<CleanupLinesResponse>, ApiError> {
    if !claims.is_admin() && !state.environment.is_development() {
        return Err(ApiError::Forbidden("Line cleanup requires an admin account".into()));
    }

    let req: CleanupLinesRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CleanupLinesRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation(format!("Invalid cleanup request: {}", e)))?
    };

    let slopes = match &req.slopes {
        Some(given) if given.is_empty() => {
            return Err(ApiError::validation("slopes must not be empty"));
        }
        Some(given) => grid::dedup_slopes(given),
        None => {
            let mut rng = rand::rng();
            grid::pick_slopes(&mut rng)
        }
    };
    let anchor = req.anchor();

    let sweep_slopes = slopes.clone();
    let deleted = run_db(&state, move |db| db.sweep_lines(anchor, &sweep_slopes)).await?;

    info!(
        "{} ran line cleanup: {} points removed (slopes {:?})",
        claims.username,
        deleted.len(),
        slopes
    );
    if !deleted.is_empty() {
        state.events.publish(MapEvent::BasePointsChanged {
            action: PointAction::Cleanup,
            user_id: None,
            count: deleted.len(),
        });
    }

    Ok(Json(CleanupLinesResponse {
        success: true,
        deleted_count: deleted.len(),
        deleted_points: deleted.iter().map(BasePoint::position).collect(),
        slopes_used: slopes,
    }))
}

fn visible_points(points: &[BasePoint], origin: Option<GridPoint>) -> Vec<GridPoint> {
    points
        .iter()
        .map(BasePoint::position)
        .filter(|p| origin.is_none_or(|o| grid::within_view(o, *p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: i64, y: i64) -> BasePoint {
        BasePoint {
            id: 0,
            user_id: "u".into(),
            x,
            y,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn origin_filters_to_view_box() {
        let points = [point(0, 0), point(25, 0), point(-20, -20)];
        let visible = visible_points(&points, Some(GridPoint::ORIGIN));
        assert_eq!(visible, vec![GridPoint::new(0, 0), GridPoint::new(-20, -20)]);
    }

    #[test]
    fn no_origin_returns_everything() {
        let points = [point(0, 0), point(25, 0)];
        assert_eq!(visible_points(&points, None).len(), 2);
    }
}

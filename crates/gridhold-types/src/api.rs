use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grid::GridPoint;
use crate::models::{BasePoint, Item};

// -- JWT Claims --

/// JWT claims issued at login and checked by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

// -- Auth --

/// Fields default to empty so a missing field is reported as a validation
/// error instead of a deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserSummary,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// Generic `{success, message}` acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

// -- Game --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameResponse {
    pub success: bool,
    pub game_joined: bool,
    pub home_x: i64,
    pub home_y: i64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusResponse {
    pub success: bool,
    pub game_joined: bool,
    pub home_x: i64,
    pub home_y: i64,
}

// -- Base points --

/// `?x=&y=` on `GET /api/base-points`. The view box applies when both
/// coordinates are present; giving only one is an error.
#[derive(Debug, Default, Deserialize)]
pub struct BasePointQuery {
    pub x: Option<i64>,
    pub y: Option<i64>,
}

impl BasePointQuery {
    pub fn origin(&self) -> Result<Option<GridPoint>, &'static str> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Ok(Some(GridPoint::new(x, y))),
            (None, None) => Ok(None),
            _ => Err("x and y must be given together"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasePointsResponse {
    pub base_points: Vec<GridPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePointResponse {
    pub success: bool,
    pub base_point: BasePoint,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletePointResponse {
    pub success: bool,
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPointsResponse {
    pub success: bool,
    pub deleted_count: usize,
}

/// Optional body for `POST /api/cleanup-lines`. Without `slopes` the server
/// draws a random set; the anchor defaults to the origin.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CleanupLinesRequest {
    pub slopes: Option<Vec<i64>>,
    pub anchor_x: Option<i64>,
    pub anchor_y: Option<i64>,
}

impl CleanupLinesRequest {
    pub fn anchor(&self) -> GridPoint {
        GridPoint::new(self.anchor_x.unwrap_or(0), self.anchor_y.unwrap_or(0))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupLinesResponse {
    pub success: bool,
    pub deleted_count: usize,
    pub deleted_points: Vec<GridPoint>,
    pub slopes_used: Vec<i64>,
}

// -- Items --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddItemRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemsResponse {
    pub items: Vec<Item>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemResponse {
    pub success: bool,
    pub item: Item,
}

// -- Errors --

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grid::GridPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub game_joined: bool,
    pub home_x: i64,
    pub home_y: i64,
}

/// A user-owned cell on the grid. Unique per `(user_id, x, y)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasePoint {
    pub id: i64,
    pub user_id: String,
    pub x: i64,
    pub y: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl BasePoint {
    pub fn position(&self) -> GridPoint {
        GridPoint::new(self.x, self.y)
    }
}

/// Inventory entry. All users share one table keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub quantity: i64,
    pub created_at_ms: i64,
}

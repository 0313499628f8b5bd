//! Database row types. These map directly to SQLite rows and stay distinct
//! from the gridhold-types API models.

use gridhold_types::grid::GridPoint;
use gridhold_types::models::{BasePoint, Item};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub game_joined: bool,
    pub home_x: i64,
    pub home_y: i64,
    pub created_at: String,
}

impl UserRow {
    pub fn home(&self) -> GridPoint {
        GridPoint::new(self.home_x, self.home_y)
    }
}

pub struct BasePointRow {
    pub id: i64,
    pub user_id: String,
    pub x: i64,
    pub y: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl From<BasePointRow> for BasePoint {
    fn from(row: BasePointRow) -> Self {
        BasePoint {
            id: row.id,
            user_id: row.user_id,
            x: row.x,
            y: row.y,
            created_at_ms: row.created_at_ms,
            updated_at_ms: row.updated_at_ms,
        }
    }
}

pub struct ItemRow {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub quantity: i64,
    pub created_at_ms: i64,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            quantity: row.quantity,
            created_at_ms: row.created_at_ms,
        }
    }
}

/// Membership state read from the `users` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameState {
    pub joined: bool,
    pub home: GridPoint,
}

/// Result of `Database::join_game`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Newly joined; the home base point exists afterwards. `created` is
    /// false when an existing point was reused as home.
    Joined { home: GridPoint, created: bool },
    /// Was already a member; nothing changed.
    AlreadyJoined(GridPoint),
    /// No such user row.
    UnknownUser,
}

use crate::models::{BasePointRow, GameState, ItemRow, JoinOutcome, UserRow};
use crate::{Database, now_ms};
use anyhow::Result;
use gridhold_types::grid::{self, GridPoint};
use gridhold_types::models::{BasePoint, Item};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

const USER_COLUMNS: &str = "id, username, password, role, game_joined, home_x, home_y, created_at";
const POINT_COLUMNS: &str = "id, user_id, x, y, created_at_ms, updated_at_ms";
const ITEM_COLUMNS: &str = "id, user_id, name, quantity, created_at_ms";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Removes the user; base points and items go with it via ON DELETE CASCADE.
    /// Returns how many base points were removed, or `None` if there was no
    /// such user.
    pub fn delete_user(&self, id: &str) -> Result<Option<usize>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let points: i64 = tx.query_row(
                "SELECT COUNT(*) FROM base_points WHERE user_id = ?1",
                [id],
                |row| row.get(0),
            )?;
            let n = tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok((n > 0).then_some(points as usize))
        })
    }

    pub fn set_user_role(&self, username: &str, role: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET role = ?2 WHERE username = ?1",
                (username, role),
            )?;
            Ok(n > 0)
        })
    }

    // -- Game membership --

    pub fn get_game_state(&self, user_id: &str) -> Result<Option<GameState>> {
        self.with_conn(|conn| query_game_state(conn, user_id))
    }

    /// NotJoined -> Joined. Home is the user's oldest base point, or the
    /// origin when they have none; the home point is created if missing.
    pub fn join_game(&self, user_id: &str) -> Result<JoinOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(state) = query_game_state(&tx, user_id)? else {
                return Ok(JoinOutcome::UnknownUser);
            };
            if state.joined {
                return Ok(JoinOutcome::AlreadyJoined(state.home));
            }

            let home = tx
                .query_row(
                    "SELECT x, y FROM base_points WHERE user_id = ?1
                     ORDER BY created_at_ms ASC, id ASC LIMIT 1",
                    [user_id],
                    |row| Ok(GridPoint::new(row.get(0)?, row.get(1)?)),
                )
                .optional()?
                .unwrap_or(GridPoint::ORIGIN);

            tx.execute(
                "UPDATE users SET game_joined = 1, home_x = ?2, home_y = ?3 WHERE id = ?1",
                params![user_id, home.x, home.y],
            )?;

            let now = now_ms();
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO base_points (user_id, x, y, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![user_id, home.x, home.y, now],
            )?;

            tx.commit()?;
            let created = inserted > 0;
            debug!("User {} joined at ({}, {}), new point: {}", user_id, home.x, home.y, created);
            Ok(JoinOutcome::Joined { home, created })
        })
    }

    /// Joined -> NotJoined. Base points are left alone.
    pub fn leave_game(&self, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE users SET game_joined = 0 WHERE id = ?1", [user_id])?;
            Ok(n > 0)
        })
    }

    // -- Base points --

    pub fn all_base_points(&self) -> Result<Vec<BasePoint>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM base_points ORDER BY id", POINT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], point_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(BasePoint::from).collect())
        })
    }

    pub fn base_points_for_user(&self, user_id: &str) -> Result<Vec<BasePoint>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM base_points WHERE user_id = ?1 ORDER BY id",
                POINT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], point_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(BasePoint::from).collect())
        })
    }

    /// Inserts the point, or bumps `updated_at_ms` if the user already owns it.
    pub fn save_base_point(&self, user_id: &str, x: i64, y: i64) -> Result<BasePoint> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO base_points (user_id, x, y, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(user_id, x, y) DO UPDATE SET updated_at_ms = excluded.updated_at_ms
                 RETURNING {}",
                POINT_COLUMNS
            );
            let row = conn.query_row(&sql, params![user_id, x, y, now_ms()], point_from_row)?;
            Ok(row.into())
        })
    }

    pub fn delete_base_point(&self, user_id: &str, x: i64, y: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM base_points WHERE user_id = ?1 AND x = ?2 AND y = ?3",
                params![user_id, x, y],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_base_point_by_id(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM base_points WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    pub fn clear_base_points_for_user(&self, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM base_points WHERE user_id = ?1", [user_id])?;
            Ok(n)
        })
    }

    /// Deletes every stored point lying on one of the lines through `anchor`
    /// with the given slopes, and returns what was removed.
    ///
    /// Rows are deleted one by one with no enclosing transaction: an error
    /// midway leaves the earlier deletions in place.
    pub fn sweep_lines(&self, anchor: GridPoint, slopes: &[i64]) -> Result<Vec<BasePoint>> {
        let doomed: Vec<BasePoint> = self
            .all_base_points()?
            .into_iter()
            .filter(|p| grid::on_any_line(p.position(), anchor, slopes))
            .collect();

        let mut deleted = Vec::with_capacity(doomed.len());
        for point in doomed {
            if self.delete_base_point_by_id(point.id)? {
                deleted.push(point);
            }
        }

        info!(
            "Line sweep through ({}, {}) with slopes {:?} removed {} points",
            anchor.x,
            anchor.y,
            slopes,
            deleted.len()
        );
        Ok(deleted)
    }

    // -- Items --

    pub fn list_items(&self, user_id: &str) -> Result<Vec<Item>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM user_items WHERE user_id = ?1 ORDER BY id",
                ITEM_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], item_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(Item::from).collect())
        })
    }

    pub fn add_item(&self, user_id: &str, name: &str, quantity: i64) -> Result<Item> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO user_items (user_id, name, quantity, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING {}",
                ITEM_COLUMNS
            );
            let row = conn.query_row(&sql, params![user_id, name, quantity, now_ms()], item_from_row)?;
            Ok(row.into())
        })
    }

    /// Only deletes items owned by `user_id`.
    pub fn delete_item(&self, user_id: &str, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM user_items WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(n > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                role: row.get(3)?,
                game_joined: row.get(4)?,
                home_x: row.get(5)?,
                home_y: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_game_state(conn: &Connection, user_id: &str) -> Result<Option<GameState>> {
    let state = conn
        .query_row(
            "SELECT game_joined, home_x, home_y FROM users WHERE id = ?1",
            [user_id],
            |row| {
                Ok(GameState {
                    joined: row.get(0)?,
                    home: GridPoint::new(row.get(1)?, row.get(2)?),
                })
            },
        )
        .optional()?;
    Ok(state)
}

fn point_from_row(row: &Row<'_>) -> rusqlite::Result<BasePointRow> {
    Ok(BasePointRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        x: row.get(2)?,
        y: row.get(3)?,
        created_at_ms: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        quantity: row.get(3)?,
        created_at_ms: row.get(4)?,
    })
}

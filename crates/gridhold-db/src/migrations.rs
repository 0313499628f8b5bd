use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

/// Ordered schema steps. Names are recorded in `migrations` once applied, so
/// entries must never be renamed or reordered; add new ones at the end.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_create_users",
        "
        CREATE TABLE users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    ),
    (
        "002_create_base_points",
        "
        CREATE TABLE base_points (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            x               INTEGER NOT NULL,
            y               INTEGER NOT NULL,
            created_at_ms   INTEGER NOT NULL,
            updated_at_ms   INTEGER NOT NULL,
            UNIQUE(user_id, x, y)
        );

        CREATE INDEX idx_base_points_user ON base_points(user_id);
        ",
    ),
    (
        "003_add_game_columns",
        "
        ALTER TABLE users ADD COLUMN game_joined INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE users ADD COLUMN home_x INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE users ADD COLUMN home_y INTEGER NOT NULL DEFAULT 0;
        ",
    ),
    (
        "004_add_user_role",
        "ALTER TABLE users ADD COLUMN role TEXT NOT NULL DEFAULT 'user';",
    ),
    (
        "005_create_user_items",
        "
        CREATE TABLE user_items (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name            TEXT NOT NULL,
            quantity        INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 0),
            created_at_ms   INTEGER NOT NULL
        );

        CREATE INDEX idx_user_items_user ON user_items(user_id);
        ",
    ),
    (
        "006_index_base_point_coords",
        "CREATE INDEX idx_base_points_coords ON base_points(x, y);",
    ),
];

/// Applies every migration not yet recorded. Each one commits on its own, so
/// a failure leaves earlier steps in place. Returns how many were applied.
pub fn run(conn: &mut Connection) -> Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            name        TEXT PRIMARY KEY,
            applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let mut applied = 0;
    for (name, sql) in MIGRATIONS {
        let seen: Option<String> = conn
            .query_row("SELECT name FROM migrations WHERE name = ?1", [name], |row| row.get(0))
            .optional()?;
        if seen.is_some() {
            debug!("Migration {} already applied", name);
            continue;
        }

        info!("Running migration {}", name);
        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("migration {} failed", name))?;
        tx.execute("INSERT INTO migrations (name) VALUES (?1)", [name])?;
        tx.commit()?;
        applied += 1;
    }

    info!("Database migrations complete ({} applied)", applied);
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_recorded_and_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(run(&mut conn).unwrap(), MIGRATIONS.len());
        assert_eq!(run(&mut conn).unwrap(), 0);

        let recorded: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(recorded as usize, MIGRATIONS.len());
    }

    #[test]
    fn later_columns_exist_after_run() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO users (id, username, password) VALUES ('u1', 'alice', 'x')",
            [],
        )
        .unwrap();
        let (joined, role): (bool, String) = conn
            .query_row("SELECT game_joined, role FROM users WHERE id = 'u1'", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert!(!joined);
        assert_eq!(role, "user");
    }
}

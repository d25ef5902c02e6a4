//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tracking_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                goal_type TEXT NOT NULL,
                description TEXT NOT NULL,
                start_weight REAL NOT NULL,
                target_weight REAL NOT NULL,
                target_date TEXT NOT NULL,
                height_cm REAL NOT NULL,
                age_years REAL NOT NULL,
                created_on TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_goals_active ON goals(goal_type, active);

            CREATE TABLE IF NOT EXISTS weight_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                recorded_weight REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_weight_log_date ON weight_log(date);

            CREATE TABLE IF NOT EXISTS exercise (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                exercise_type TEXT NOT NULL,
                duration_minutes REAL NOT NULL,
                calorie_burn INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_exercise_date ON exercise(date);

            CREATE TABLE IF NOT EXISTS progress_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                log_date TEXT NOT NULL,
                laps REAL NOT NULL DEFAULT 0,
                calories_burned INTEGER NOT NULL DEFAULT 0,
                weight REAL,
                logged_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS food_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                calories_per_100g REAL NOT NULL,
                protein REAL NOT NULL DEFAULT 0,
                carbohydrates REAL NOT NULL DEFAULT 0,
                fat REAL NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS actual_meals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                food_id INTEGER REFERENCES food_items(id),
                description TEXT NOT NULL,
                quantity REAL NOT NULL,
                total_calories REAL NOT NULL,
                meal_name TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_actual_meals_date ON actual_meals(date);

            CREATE TABLE IF NOT EXISTS deviations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                reason TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS planned_meals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                position INTEGER NOT NULL,
                meal_name TEXT NOT NULL,
                food_name TEXT NOT NULL,
                quantity_grams INTEGER NOT NULL,
                calories INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_planned_meals_date ON planned_meals(date);
        "#,
    },
    Migration {
        version: 2,
        name: "prompt_catalog",
        sql: r#"
            CREATE TABLE IF NOT EXISTS prompt_catalog (
                kind TEXT NOT NULL,
                position INTEGER NOT NULL,
                label TEXT NOT NULL,
                prompt TEXT NOT NULL,
                field TEXT NOT NULL,
                PRIMARY KEY (kind, position)
            );

            INSERT OR IGNORE INTO prompt_catalog (kind, position, label, prompt, field) VALUES
                ('setup', 1, 'Start weight', 'First things first: what do you weigh right now, in lbs?', 'StartWeight'),
                ('setup', 2, 'Target weight', 'What weight are we aiming for, in lbs?', 'TargetWeight'),
                ('setup', 3, 'Target date', 'When do you want to hit it? Give me a date like 2027-06-01.', 'TargetDate'),
                ('setup', 4, 'Current weight', 'Confirm today''s weight for the log, in lbs.', 'CurrentWeight'),
                ('setup', 5, 'Height', 'How tall are you, in centimetres?', 'HeightCm'),
                ('setup', 6, 'Age', 'And how old are you?', 'AgeYears'),
                ('daily', 1, 'Weigh-in', 'Morning weigh-in time! What does the scale say, in lbs?', 'CurrentWeight'),
                ('daily', 2, 'Yesterday''s exercise', 'Did you exercise yesterday? Say ''no'' or something like ''12 laps''.', 'YesterdayExercise'),
                ('daily', 3, 'Yesterday''s breakfast', 'What did you have for breakfast yesterday? Like ''100g Ribeye'', or ''nothing''.', 'Breakfast'),
                ('daily', 4, 'Yesterday''s first snack', 'Any morning snack yesterday? Like ''30g Bacon'', or ''nothing''.', 'Snack1'),
                ('daily', 5, 'Yesterday''s lunch', 'What was lunch yesterday? Like ''150g Ground Beef (80/20)'', or ''nothing''.', 'Lunch'),
                ('daily', 6, 'Yesterday''s second snack', 'Afternoon snack yesterday? Quantity and food, or ''nothing''.', 'Snack2'),
                ('daily', 7, 'Yesterday''s dinner', 'And dinner yesterday? Quantity and food, or ''nothing''.', 'Dinner');

            INSERT OR IGNORE INTO food_items (name, calories_per_100g, protein, carbohydrates, fat, active) VALUES
                ('Beef Ribeye', 291, 24, 0, 22, 0),
                ('Bacon', 541, 37, 0, 42, 0),
                ('Ground Beef (80/20)', 307, 17, 0, 26, 0);
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    tracing::info!(
        "Database migrations complete (at V{})",
        get_current_version(conn).await?
    );

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Record a migration version as applied.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    async fn count(conn: &Connection, sql: &str) -> i64 {
        let mut rows = conn.query(sql, ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        row.get(0).unwrap()
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in &[
            "goals",
            "weight_log",
            "exercise",
            "progress_log",
            "food_items",
            "actual_meals",
            "deviations",
            "planned_meals",
            "prompt_catalog",
            "_migrations",
        ] {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap().unwrap();
            let count: i64 = row.get(0).unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        assert_eq!(count(&conn, "SELECT MAX(version) FROM _migrations").await, 2);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM prompt_catalog WHERE kind = 'setup'").await,
            6
        );
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM prompt_catalog WHERE kind = 'daily'").await,
            7
        );
    }

    #[tokio::test]
    async fn default_foods_start_inactive() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM food_items").await, 3);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM food_items WHERE active = 1").await,
            0
        );
    }
}

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            username    TEXT PRIMARY KEY,
            watch_time  INTEGER NOT NULL DEFAULT 0,
            last_active INTEGER NOT NULL,
            time_limit  INTEGER,
            last_reset  INTEGER
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

//! Ordered schema migrations
//!
//! Each step runs once, in its own transaction, and bumps `user_version` to
//! its `version`. Append new steps; never edit a shipped one.

pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "characters",
    sql: r#"
        CREATE TABLE characters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,   -- positive, embedded in channel names
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL             -- Unix timestamp ms
        );

        CREATE INDEX idx_characters_name ON characters(name);
    "#,
}];

/// Version a fully migrated database reports
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

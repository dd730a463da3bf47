//! Character CRUD operations
//!
//! A character owns one dice channel, keyed by its numeric id.

use super::{now_ms, Database};
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A player character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
}

/// Lookup used by the overlay to resolve the character it shows rolls for
pub trait CharacterStore: Send + Sync {
    fn find_character(&self, id: i64) -> Result<Option<Character>>;
}

/// Parse a character id as it arrives from a URL or command line.
///
/// Only positive decimal integers are ids; anything else resolves to no
/// character at all.
pub fn parse_character_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

// Database operations
impl Database {
    /// Insert a new character and return it with its assigned id
    pub fn insert_character(&self, name: &str) -> Result<Character> {
        let conn = self.conn()?;
        let created_at = now_ms();
        conn.execute(
            "INSERT INTO characters (name, created_at) VALUES (?1, ?2)",
            params![name, created_at],
        )
        .context("failed to insert character")?;

        Ok(Character {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            created_at,
        })
    }

    /// Get character by ID
    pub fn get_character(&self, id: i64) -> Result<Option<Character>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM characters WHERE id = ?1")
            .context("failed to prepare character query")?;

        let character = stmt
            .query_row(params![id], |row| {
                Ok(Character {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .optional()
            .context("failed to query character")?;

        Ok(character)
    }

    /// List all characters
    pub fn list_characters(&self) -> Result<Vec<Character>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM characters ORDER BY id")
            .context("failed to prepare characters query")?;

        let characters = stmt
            .query([])?
            .mapped(|row| {
                Ok(Character {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .context("failed to list characters")?;

        Ok(characters)
    }

    /// Rename a character. Returns false if no such id.
    pub fn rename_character(&self, id: i64, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE characters SET name = ?2 WHERE id = ?1",
                params![id, name],
            )
            .context("failed to rename character")?;
        Ok(changed > 0)
    }

    /// Delete a character. Returns false if no such id.
    pub fn delete_character(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM characters WHERE id = ?1", params![id])
            .context("failed to delete character")?;
        Ok(changed > 0)
    }
}

impl CharacterStore for Database {
    fn find_character(&self, id: i64) -> Result<Option<Character>> {
        self.get_character(id)
    }
}

use rusqlite::{params, OptionalExtension};

use parlor_shared::IdentScreenName;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Store the raw TOC config blob for a user, replacing any prior value.
    pub fn set_toc_config(&self, ident: &IdentScreenName, config: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO toc_config (ident, config)
             VALUES (?1, ?2)
             ON CONFLICT (ident) DO UPDATE SET config = excluded.config",
            params![ident.as_str(), config],
        )?;
        Ok(())
    }

    /// The stored config blob, or an empty string if the user never set one.
    pub fn toc_config(&self, ident: &IdentScreenName) -> Result<String> {
        self.conn()
            .query_row(
                "SELECT config FROM toc_config WHERE ident = ?1",
                params![ident.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map(|c| c.unwrap_or_default())
            .map_err(StoreError::Sqlite)
    }
}

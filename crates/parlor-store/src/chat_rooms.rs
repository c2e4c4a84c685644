use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use parlor_shared::IdentScreenName;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ChatRoom;

impl Database {
    /// Persist a new room. If a room with the same name already exists on
    /// the exchange, the existing row is returned instead. Room names are
    /// matched case-insensitively.
    pub fn create_chat_room(&self, room: &ChatRoom) -> Result<ChatRoom> {
        let inserted = self.conn().execute(
            "INSERT INTO chat_rooms (cookie, exchange, name, created, creator, instance,
                                     detail_level)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (exchange, lower(name)) DO NOTHING",
            params![
                room.cookie,
                room.exchange,
                room.name,
                room.created.to_rfc3339(),
                room.creator.as_str(),
                room.instance,
                room.detail_level,
            ],
        )?;
        if inserted > 0 {
            return Ok(room.clone());
        }
        self.chat_room_by_name(room.exchange, &room.name)?
            .ok_or(StoreError::NotFound)
    }

    pub fn chat_room_by_cookie(&self, cookie: &str) -> Result<Option<ChatRoom>> {
        self.conn()
            .query_row(
                "SELECT cookie, exchange, name, created, creator, instance, detail_level
                 FROM chat_rooms WHERE cookie = ?1",
                params![cookie],
                row_to_room,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    pub fn chat_room_by_name(&self, exchange: u16, name: &str) -> Result<Option<ChatRoom>> {
        self.conn()
            .query_row(
                "SELECT cookie, exchange, name, created, creator, instance, detail_level
                 FROM chat_rooms WHERE exchange = ?1 AND lower(name) = lower(?2)",
                params![exchange, name],
                row_to_room,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRoom> {
    let created: String = row.get(3)?;
    let creator: String = row.get(4)?;
    let created = DateTime::parse_from_rfc3339(&created)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(ChatRoom {
        cookie: row.get(0)?,
        exchange: row.get(1)?,
        name: row.get(2)?,
        created,
        creator: IdentScreenName::new(&creator),
        instance: row.get(5)?,
        detail_level: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(cookie: &str, name: &str) -> ChatRoom {
        ChatRoom {
            cookie: cookie.to_string(),
            exchange: 4,
            name: name.to_string(),
            created: Utc::now(),
            creator: IdentScreenName::new("alice"),
            instance: 0,
            detail_level: 2,
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_chat_room(&room("cookie-1", "lobby")).unwrap();
        assert_eq!(created.cookie, "cookie-1");

        let fetched = db.chat_room_by_cookie("cookie-1").unwrap().unwrap();
        assert_eq!(fetched.name, "lobby");
    }

    #[test]
    fn test_create_returns_existing_room() {
        let db = Database::open_in_memory().unwrap();
        db.create_chat_room(&room("cookie-1", "lobby")).unwrap();

        // same name, different case and cookie: the original row wins
        let second = db.create_chat_room(&room("cookie-2", "LOBBY")).unwrap();
        assert_eq!(second.cookie, "cookie-1");
    }

    #[test]
    fn test_unknown_cookie_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.chat_room_by_cookie("nope").unwrap().is_none());
    }
}

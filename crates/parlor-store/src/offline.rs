use chrono::{DateTime, Utc};
use rusqlite::params;

use parlor_shared::IdentScreenName;

use crate::database::Database;
use crate::error::Result;
use crate::models::OfflineMessage;

impl Database {
    pub fn enqueue_offline_message(&self, message: &OfflineMessage) -> Result<()> {
        self.conn().execute(
            "INSERT INTO offline_messages (sender, recipient, sent_at, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                message.sender.as_str(),
                message.recipient.as_str(),
                message.sent_at.to_rfc3339(),
                message.payload,
            ],
        )?;
        Ok(())
    }

    /// Messages parked for `recipient`, oldest first.
    pub fn offline_messages(&self, recipient: &IdentScreenName) -> Result<Vec<OfflineMessage>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT sender, recipient, sent_at, payload
             FROM offline_messages
             WHERE recipient = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![recipient.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (sender, recipient, sent_at, payload) = row?;
            messages.push(OfflineMessage {
                sender: IdentScreenName::new(&sender),
                recipient: IdentScreenName::new(&recipient),
                sent_at: DateTime::parse_from_rfc3339(&sent_at)?.with_timezone(&Utc),
                payload,
            });
        }
        Ok(messages)
    }

    pub fn delete_offline_messages(&self, recipient: &IdentScreenName) -> Result<()> {
        self.conn().execute(
            "DELETE FROM offline_messages WHERE recipient = ?1",
            params![recipient.as_str()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, recipient: &str, payload: &[u8]) -> OfflineMessage {
        OfflineMessage {
            sender: IdentScreenName::new(sender),
            recipient: IdentScreenName::new(recipient),
            sent_at: Utc::now(),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_delivery_in_sent_order() {
        let db = Database::open_in_memory().unwrap();
        let bob = IdentScreenName::new("bob");

        db.enqueue_offline_message(&message("alice", "bob", b"hi")).unwrap();
        db.enqueue_offline_message(&message("alice", "bob", b"there")).unwrap();

        let queued = db.offline_messages(&bob).unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].payload, b"hi");
        assert_eq!(queued[1].payload, b"there");
    }

    #[test]
    fn test_delete_empties_queue() {
        let db = Database::open_in_memory().unwrap();
        let bob = IdentScreenName::new("bob");

        db.enqueue_offline_message(&message("alice", "bob", b"hi")).unwrap();
        db.delete_offline_messages(&bob).unwrap();
        assert!(db.offline_messages(&bob).unwrap().is_empty());
    }

    #[test]
    fn test_queue_is_per_recipient() {
        let db = Database::open_in_memory().unwrap();
        db.enqueue_offline_message(&message("alice", "bob", b"hi")).unwrap();
        assert!(db.offline_messages(&IdentScreenName::new("carol")).unwrap().is_empty());
    }
}

use rusqlite::{params, OptionalExtension};

use parlor_shared::{DisplayScreenName, IdentScreenName};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{DirInfo, User};

impl Database {
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let changed = self.conn().execute(
            "INSERT INTO users (ident, display, auth_key, strong_md5, weak_md5, profile,
                                confirmed, reg_status, email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (ident) DO NOTHING",
            params![
                user.ident.as_str(),
                user.display.as_str(),
                user.auth_key,
                user.strong_md5,
                user.weak_md5,
                user.profile,
                user.confirmed,
                user.reg_status,
                user.email,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::AlreadyExists);
        }
        Ok(())
    }

    pub fn user(&self, ident: &IdentScreenName) -> Result<Option<User>> {
        self.conn()
            .query_row(
                "SELECT ident, display, auth_key, strong_md5, weak_md5, profile,
                        confirmed, reg_status, email
                 FROM users WHERE ident = ?1",
                params![ident.as_str()],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    pub fn all_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT ident, display, auth_key, strong_md5, weak_md5, profile,
                    confirmed, reg_status, email
             FROM users ORDER BY ident",
        )?;
        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    pub fn set_profile(&self, ident: &IdentScreenName, profile: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE users SET profile = ?2 WHERE ident = ?1",
            params![ident.as_str(), profile],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Fetch a user's profile. Returns `NotFound` for unknown users; an
    /// existing user with no profile yields an empty string.
    pub fn profile(&self, ident: &IdentScreenName) -> Result<String> {
        self.conn()
            .query_row(
                "SELECT profile FROM users WHERE ident = ?1",
                params![ident.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    pub fn confirmed(&self, ident: &IdentScreenName) -> Result<bool> {
        self.conn()
            .query_row(
                "SELECT confirmed FROM users WHERE ident = ?1",
                params![ident.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    pub fn set_confirmed(&self, ident: &IdentScreenName, confirmed: bool) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE users SET confirmed = ?2 WHERE ident = ?1",
            params![ident.as_str(), confirmed],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn set_email(&self, ident: &IdentScreenName, email: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE users SET email = ?2 WHERE ident = ?1",
            params![ident.as_str(), email],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn set_dir_info(&self, ident: &IdentScreenName, info: &DirInfo) -> Result<()> {
        self.conn().execute(
            "INSERT INTO dir_info (ident, first_name, middle_name, last_name, maiden_name,
                                   email, country, state, city)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (ident)
                 DO UPDATE SET first_name  = excluded.first_name,
                               middle_name = excluded.middle_name,
                               last_name   = excluded.last_name,
                               maiden_name = excluded.maiden_name,
                               email       = excluded.email,
                               country     = excluded.country,
                               state       = excluded.state,
                               city        = excluded.city",
            params![
                ident.as_str(),
                info.first_name,
                info.middle_name,
                info.last_name,
                info.maiden_name,
                info.email,
                info.country,
                info.state,
                info.city,
            ],
        )?;
        Ok(())
    }

    pub fn dir_info(&self, ident: &IdentScreenName) -> Result<Option<DirInfo>> {
        self.conn()
            .query_row(
                "SELECT first_name, middle_name, last_name, maiden_name, email,
                        country, state, city
                 FROM dir_info WHERE ident = ?1",
                params![ident.as_str()],
                |row| {
                    Ok(DirInfo {
                        first_name: row.get(0)?,
                        middle_name: row.get(1)?,
                        last_name: row.get(2)?,
                        maiden_name: row.get(3)?,
                        email: row.get(4)?,
                        country: row.get(5)?,
                        state: row.get(6)?,
                        city: row.get(7)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let ident: String = row.get(0)?;
    let display: String = row.get(1)?;
    Ok(User {
        ident: IdentScreenName::new(&ident),
        display: DisplayScreenName::new(display),
        auth_key: row.get(2)?,
        strong_md5: row.get(3)?,
        weak_md5: row.get(4)?,
        profile: row.get(5)?,
        confirmed: row.get(6)?,
        reg_status: row.get(7)?,
        email: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample_user(name: &str) -> User {
        User::new(DisplayScreenName::new(name), "hunter2", "salt".into())
    }

    #[test]
    fn test_insert_and_fetch() {
        let db = test_db();
        let user = sample_user("Chatting Chuck");
        db.insert_user(&user).unwrap();

        let fetched = db.user(&IdentScreenName::new("chattingchuck")).unwrap().unwrap();
        assert_eq!(fetched, user);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let db = test_db();
        db.insert_user(&sample_user("chuck")).unwrap();
        assert!(matches!(
            db.insert_user(&sample_user("chuck")),
            Err(StoreError::AlreadyExists)
        ));
    }

    #[test]
    fn test_unknown_user_is_none() {
        let db = test_db();
        assert!(db.user(&IdentScreenName::new("ghost")).unwrap().is_none());
    }

    #[test]
    fn test_profile_round_trip() {
        let db = test_db();
        db.insert_user(&sample_user("chuck")).unwrap();
        let ident = IdentScreenName::new("chuck");

        assert_eq!(db.profile(&ident).unwrap(), "");
        db.set_profile(&ident, "<html>hi</html>").unwrap();
        assert_eq!(db.profile(&ident).unwrap(), "<html>hi</html>");
    }

    #[test]
    fn test_profile_unknown_user() {
        let db = test_db();
        assert!(matches!(
            db.profile(&IdentScreenName::new("ghost")),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_dir_info_upsert() {
        let db = test_db();
        let ident = IdentScreenName::new("chuck");
        assert!(db.dir_info(&ident).unwrap().is_none());

        let mut info = DirInfo {
            first_name: "Chuck".into(),
            city: "Dulles".into(),
            ..Default::default()
        };
        db.set_dir_info(&ident, &info).unwrap();
        assert_eq!(db.dir_info(&ident).unwrap().unwrap(), info);

        info.city = "Reston".into();
        db.set_dir_info(&ident, &info).unwrap();
        assert_eq!(db.dir_info(&ident).unwrap().unwrap().city, "Reston");
    }
}

//! Feedbag persistence and the relationship queries derived from it.
//!
//! Buddy, permit, and deny entry names are canonicalized on write so that
//! every lookup joins on the Ident form. Item attributes are stored as the
//! raw TLV bytes the client sent and round-trip untouched.

use bytes::Bytes;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use parlor_shared::wire::bodies::feedbag::{attr, class, pdmode, FeedbagItem};
use parlor_shared::wire::tlv::{Tlv, TlvBlock};
use parlor_shared::IdentScreenName;

use crate::database::Database;
use crate::error::Result;

/// Permit/deny mode plus both lists, the inputs to every visibility check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityPrefs {
    pub pd_mode: Option<u8>,
    pub permit: Vec<IdentScreenName>,
    pub deny: Vec<IdentScreenName>,
}

impl VisibilityPrefs {
    /// Whether `other` is blocked under these preferences.
    pub fn blocks(&self, other: &IdentScreenName) -> bool {
        match self.pd_mode {
            Some(pdmode::DENY_ALL) => true,
            Some(pdmode::PERMIT_SOME) => !self.permit.contains(other),
            Some(pdmode::DENY_SOME) => self.deny.contains(other),
            _ => false,
        }
    }
}

fn canonical_name(item: &FeedbagItem) -> String {
    match item.class_id {
        class::BUDDY | class::PERMIT | class::DENY => {
            IdentScreenName::new(&item.name).as_str().to_string()
        }
        _ => item.name.clone(),
    }
}

impl Database {
    pub fn feedbag_items(&self, ident: &IdentScreenName) -> Result<Vec<FeedbagItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT group_id, item_id, class_id, name, attributes
             FROM feedbag WHERE ident = ?1
             ORDER BY group_id, item_id",
        )?;
        let rows = stmt.query_map(params![ident.as_str()], |row| {
            Ok((
                row.get::<_, u16>(0)?,
                row.get::<_, u16>(1)?,
                row.get::<_, u16>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Vec<u8>>(4)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (group_id, item_id, class_id, name, attrs) = row?;
            let attributes = TlvBlock::decode_rest(&mut Bytes::from(attrs))?;
            items.push(FeedbagItem {
                name,
                group_id,
                item_id,
                class_id,
                attributes,
            });
        }
        Ok(items)
    }

    /// Unix timestamp of the newest change to this user's feedbag.
    pub fn feedbag_last_modified(&self, ident: &IdentScreenName) -> Result<u32> {
        let ts: Option<i64> = self.conn().query_row(
            "SELECT MAX(last_modified) FROM feedbag WHERE ident = ?1",
            params![ident.as_str()],
            |row| row.get(0),
        )?;
        Ok(ts.unwrap_or(0) as u32)
    }

    pub fn feedbag_upsert(&self, ident: &IdentScreenName, items: &[FeedbagItem]) -> Result<()> {
        let now = Utc::now().timestamp();
        let conn = self.conn();
        for item in items {
            let mut attrs = Vec::new();
            item.attributes.encode_rest(&mut attrs);
            conn.execute(
                "INSERT INTO feedbag (ident, group_id, item_id, class_id, name, attributes,
                                      last_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (ident, group_id, item_id)
                     DO UPDATE SET class_id      = excluded.class_id,
                                   name          = excluded.name,
                                   attributes    = excluded.attributes,
                                   last_modified = excluded.last_modified",
                params![
                    ident.as_str(),
                    item.group_id,
                    item.item_id,
                    item.class_id,
                    canonical_name(item),
                    attrs,
                    now,
                ],
            )?;
        }
        Ok(())
    }

    pub fn feedbag_delete(&self, ident: &IdentScreenName, items: &[FeedbagItem]) -> Result<()> {
        let conn = self.conn();
        for item in items {
            conn.execute(
                "DELETE FROM feedbag WHERE ident = ?1 AND group_id = ?2 AND item_id = ?3",
                params![ident.as_str(), item.group_id, item.item_id],
            )?;
        }
        Ok(())
    }

    /// Screen names on `ident`'s buddy list.
    pub fn buddies(&self, ident: &IdentScreenName) -> Result<Vec<IdentScreenName>> {
        self.name_query(
            "SELECT name FROM feedbag WHERE ident = ?1 AND class_id = 0 ORDER BY name",
            ident,
        )
    }

    /// Users who have `ident` on their buddy list. Blocking is applied by
    /// the caller; this is pure list membership.
    pub fn watchers(&self, ident: &IdentScreenName) -> Result<Vec<IdentScreenName>> {
        self.name_query(
            "SELECT DISTINCT ident FROM feedbag WHERE name = ?1 AND class_id = 0",
            ident,
        )
    }

    pub fn permit_list(&self, ident: &IdentScreenName) -> Result<Vec<IdentScreenName>> {
        self.name_query(
            "SELECT name FROM feedbag WHERE ident = ?1 AND class_id = 2 ORDER BY name",
            ident,
        )
    }

    pub fn deny_list(&self, ident: &IdentScreenName) -> Result<Vec<IdentScreenName>> {
        self.name_query(
            "SELECT name FROM feedbag WHERE ident = ?1 AND class_id = 3 ORDER BY name",
            ident,
        )
    }

    fn name_query(&self, sql: &str, ident: &IdentScreenName) -> Result<Vec<IdentScreenName>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![ident.as_str()], |row| row.get::<_, String>(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(IdentScreenName::new(&row?));
        }
        Ok(names)
    }

    pub fn pd_mode(&self, ident: &IdentScreenName) -> Result<Option<u8>> {
        let attrs: Option<Vec<u8>> = self
            .conn()
            .query_row(
                "SELECT attributes FROM feedbag WHERE ident = ?1 AND class_id = 4",
                params![ident.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(attrs) = attrs else {
            return Ok(None);
        };
        let block = TlvBlock::decode_rest(&mut Bytes::from(attrs))?;
        Ok(block.u8(attr::PD_MODE))
    }

    pub fn set_pd_mode(&self, ident: &IdentScreenName, mode: u8) -> Result<()> {
        let item_id = self.pd_info_item_id(ident)?;
        let item = FeedbagItem {
            name: String::new(),
            group_id: 0,
            item_id,
            class_id: class::PD_INFO,
            attributes: TlvBlock::new(vec![Tlv::u8(attr::PD_MODE, mode)]),
        };
        self.feedbag_upsert(ident, std::slice::from_ref(&item))
    }

    /// Everything a visibility check needs, in one call.
    pub fn visibility_prefs(&self, ident: &IdentScreenName) -> Result<VisibilityPrefs> {
        Ok(VisibilityPrefs {
            pd_mode: self.pd_mode(ident)?,
            permit: self.permit_list(ident)?,
            deny: self.deny_list(ident)?,
        })
    }

    /// Add screen names to the permit or deny list (class 2 or 3), skipping
    /// entries already present.
    pub fn add_pd_entries(
        &self,
        ident: &IdentScreenName,
        class_id: u16,
        users: &[IdentScreenName],
    ) -> Result<()> {
        debug_assert!(class_id == class::PERMIT || class_id == class::DENY);
        let existing = match class_id {
            class::PERMIT => self.permit_list(ident)?,
            _ => self.deny_list(ident)?,
        };
        let mut next_id = self.next_item_id(ident)?;
        let mut items = Vec::new();
        for user in users {
            if existing.contains(user) {
                continue;
            }
            items.push(FeedbagItem {
                name: user.as_str().to_string(),
                group_id: 0,
                item_id: next_id,
                class_id,
                attributes: TlvBlock::default(),
            });
            next_id += 1;
        }
        self.feedbag_upsert(ident, &items)
    }

    pub fn remove_pd_entries(
        &self,
        ident: &IdentScreenName,
        class_id: u16,
        users: &[IdentScreenName],
    ) -> Result<()> {
        let conn = self.conn();
        for user in users {
            conn.execute(
                "DELETE FROM feedbag WHERE ident = ?1 AND class_id = ?2 AND name = ?3",
                params![ident.as_str(), class_id, user.as_str()],
            )?;
        }
        Ok(())
    }

    fn next_item_id(&self, ident: &IdentScreenName) -> Result<u16> {
        let max: Option<i64> = self.conn().query_row(
            "SELECT MAX(item_id) FROM feedbag WHERE ident = ?1",
            params![ident.as_str()],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) as u16 + 1)
    }

    fn pd_info_item_id(&self, ident: &IdentScreenName) -> Result<u16> {
        let existing: Option<u16> = self
            .conn()
            .query_row(
                "SELECT item_id FROM feedbag WHERE ident = ?1 AND class_id = 4",
                params![ident.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(id) => Ok(id),
            None => self.next_item_id(ident),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn ident(name: &str) -> IdentScreenName {
        IdentScreenName::new(name)
    }

    fn buddy_item(name: &str, item_id: u16) -> FeedbagItem {
        FeedbagItem {
            name: name.to_string(),
            group_id: 1,
            item_id,
            class_id: class::BUDDY,
            attributes: TlvBlock::default(),
        }
    }

    #[test]
    fn test_upsert_and_retrieve() {
        let db = test_db();
        let me = ident("alice");
        db.feedbag_upsert(&me, &[buddy_item("Bob Jones", 1)]).unwrap();

        let items = db.feedbag_items(&me).unwrap();
        assert_eq!(items.len(), 1);
        // buddy names are canonicalized on write
        assert_eq!(items[0].name, "bobjones");
    }

    #[test]
    fn test_unique_key_upserts_in_place() {
        let db = test_db();
        let me = ident("alice");
        db.feedbag_upsert(&me, &[buddy_item("bob", 1)]).unwrap();
        db.feedbag_upsert(&me, &[buddy_item("carol", 1)]).unwrap();

        let items = db.feedbag_items(&me).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "carol");
    }

    #[test]
    fn test_buddies_and_watchers() {
        let db = test_db();
        db.feedbag_upsert(&ident("alice"), &[buddy_item("bob", 1)]).unwrap();
        db.feedbag_upsert(&ident("carol"), &[buddy_item("bob", 1)]).unwrap();

        assert_eq!(db.buddies(&ident("alice")).unwrap(), vec![ident("bob")]);
        let mut watchers = db.watchers(&ident("bob")).unwrap();
        watchers.sort();
        assert_eq!(watchers, vec![ident("alice"), ident("carol")]);
        assert!(db.watchers(&ident("alice")).unwrap().is_empty());
    }

    #[test]
    fn test_attributes_round_trip_unknown_tags() {
        let db = test_db();
        let me = ident("alice");
        let mut item = buddy_item("bob", 1);
        item.attributes.append(Tlv::new(0x7777, vec![9, 8, 7]));
        db.feedbag_upsert(&me, std::slice::from_ref(&item)).unwrap();

        let items = db.feedbag_items(&me).unwrap();
        assert_eq!(items[0].attributes.bytes(0x7777), Some(&[9, 8, 7][..]));
    }

    #[test]
    fn test_pd_mode_round_trip() {
        let db = test_db();
        let me = ident("alice");
        assert_eq!(db.pd_mode(&me).unwrap(), None);

        db.set_pd_mode(&me, pdmode::DENY_SOME).unwrap();
        assert_eq!(db.pd_mode(&me).unwrap(), Some(pdmode::DENY_SOME));

        db.set_pd_mode(&me, pdmode::PERMIT_ALL).unwrap();
        assert_eq!(db.pd_mode(&me).unwrap(), Some(pdmode::PERMIT_ALL));
        // mode updates reuse the same pdinfo item
        let pd_items: Vec<_> = db
            .feedbag_items(&me)
            .unwrap()
            .into_iter()
            .filter(|i| i.class_id == class::PD_INFO)
            .collect();
        assert_eq!(pd_items.len(), 1);
    }

    #[test]
    fn test_permit_deny_entries() {
        let db = test_db();
        let me = ident("alice");
        db.add_pd_entries(&me, class::DENY, &[ident("mallory"), ident("trudy")])
            .unwrap();
        // re-adding is a no-op
        db.add_pd_entries(&me, class::DENY, &[ident("mallory")]).unwrap();
        assert_eq!(db.deny_list(&me).unwrap(), vec![ident("mallory"), ident("trudy")]);

        db.remove_pd_entries(&me, class::DENY, &[ident("mallory")]).unwrap();
        assert_eq!(db.deny_list(&me).unwrap(), vec![ident("trudy")]);
    }

    #[test]
    fn test_visibility_blocks() {
        let prefs = VisibilityPrefs {
            pd_mode: Some(pdmode::DENY_SOME),
            permit: vec![],
            deny: vec![ident("mallory")],
        };
        assert!(prefs.blocks(&ident("mallory")));
        assert!(!prefs.blocks(&ident("bob")));

        let prefs = VisibilityPrefs {
            pd_mode: Some(pdmode::PERMIT_SOME),
            permit: vec![ident("bob")],
            deny: vec![],
        };
        assert!(!prefs.blocks(&ident("bob")));
        assert!(prefs.blocks(&ident("carol")));

        let prefs = VisibilityPrefs {
            pd_mode: Some(pdmode::DENY_ALL),
            ..Default::default()
        };
        assert!(prefs.blocks(&ident("anyone")));
    }

    #[test]
    fn test_last_modified_advances() {
        let db = test_db();
        let me = ident("alice");
        assert_eq!(db.feedbag_last_modified(&me).unwrap(), 0);
        db.feedbag_upsert(&me, &[buddy_item("bob", 1)]).unwrap();
        assert!(db.feedbag_last_modified(&me).unwrap() > 0);
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        let me = ident("alice");
        let item = buddy_item("bob", 1);
        db.feedbag_upsert(&me, std::slice::from_ref(&item)).unwrap();
        db.feedbag_delete(&me, std::slice::from_ref(&item)).unwrap();
        assert!(db.feedbag_items(&me).unwrap().is_empty());
    }
}

//! v001 -- Initial schema creation.
//!
//! Creates the core tables: `users`, `feedbag`, `dir_info`,
//! `offline_messages`, `chat_rooms`, and `toc_config`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    ident      TEXT PRIMARY KEY NOT NULL,   -- canonical screen name / UIN
    display    TEXT NOT NULL,               -- screen name as registered
    auth_key   TEXT NOT NULL,               -- MD5 salt
    strong_md5 BLOB NOT NULL,               -- md5(key || md5(pass) || suffix)
    weak_md5   BLOB NOT NULL,               -- md5(key || pass || suffix)
    profile    TEXT NOT NULL DEFAULT '',
    confirmed  INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    reg_status INTEGER NOT NULL DEFAULT 3,
    email      TEXT NOT NULL DEFAULT ''
);

-- ----------------------------------------------------------------
-- Feedbag (server-side buddy list)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS feedbag (
    ident         TEXT NOT NULL,            -- list owner
    group_id      INTEGER NOT NULL,
    item_id       INTEGER NOT NULL,
    class_id      INTEGER NOT NULL,
    name          TEXT NOT NULL,
    attributes    BLOB NOT NULL,            -- raw TLVs, preserved verbatim
    last_modified INTEGER NOT NULL,         -- unix epoch

    PRIMARY KEY (ident, group_id, item_id)
);

CREATE INDEX IF NOT EXISTS idx_feedbag_name_class ON feedbag(name, class_id);

-- ----------------------------------------------------------------
-- Directory info
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS dir_info (
    ident       TEXT PRIMARY KEY NOT NULL,
    first_name  TEXT NOT NULL DEFAULT '',
    middle_name TEXT NOT NULL DEFAULT '',
    last_name   TEXT NOT NULL DEFAULT '',
    maiden_name TEXT NOT NULL DEFAULT '',
    email       TEXT NOT NULL DEFAULT '',
    country     TEXT NOT NULL DEFAULT '',
    state       TEXT NOT NULL DEFAULT '',
    city        TEXT NOT NULL DEFAULT ''
);

-- ----------------------------------------------------------------
-- Offline messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS offline_messages (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    sender    TEXT NOT NULL,
    recipient TEXT NOT NULL,
    sent_at   TEXT NOT NULL,                -- ISO-8601 / RFC-3339
    payload   BLOB NOT NULL                 -- encoded ICBM body
);

CREATE INDEX IF NOT EXISTS idx_offline_recipient ON offline_messages(recipient, id);

-- ----------------------------------------------------------------
-- Chat rooms
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_rooms (
    cookie       TEXT PRIMARY KEY NOT NULL, -- canonical wire identifier
    exchange     INTEGER NOT NULL,
    name         TEXT NOT NULL,
    created      TEXT NOT NULL,             -- ISO-8601
    creator      TEXT NOT NULL,
    instance     INTEGER NOT NULL DEFAULT 0,
    detail_level INTEGER NOT NULL DEFAULT 2
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_chat_rooms_exchange_name
    ON chat_rooms(exchange, lower(name));

-- ----------------------------------------------------------------
-- TOC client config blobs
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS toc_config (
    ident  TEXT PRIMARY KEY NOT NULL,
    config TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

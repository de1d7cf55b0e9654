//! SQL schema for the songvote SQLite store.
//!
//! Executed once at connection startup. Every statement is guarded with
//! `IF NOT EXISTS`, so re-running against an existing database is a no-op.

/// Connection-level settings applied before the schema.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
";

/// Full schema DDL; idempotent thanks to `CREATE … IF NOT EXISTS`.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id               INTEGER PRIMARY KEY,
    name             TEXT    NOT NULL,
    password_hash    TEXT    NOT NULL,
    inactive         INTEGER NOT NULL DEFAULT 0,
    vetoes_remaining INTEGER NOT NULL DEFAULT 1 CHECK (vetoes_remaining >= 0)
);

-- Names only need to be unique among active users; retired rows keep theirs.
CREATE UNIQUE INDEX IF NOT EXISTS users_active_name_idx
    ON users(name) WHERE inactive = 0;

CREATE TABLE IF NOT EXISTS songs (
    id       INTEGER PRIMARY KEY,
    title    TEXT    NOT NULL,
    artist   TEXT    NOT NULL,
    link_url TEXT    NOT NULL DEFAULT '',
    votes    INTEGER NOT NULL DEFAULT 0 CHECK (votes >= 0),
    vetoed   INTEGER NOT NULL DEFAULT 0,
    added_by INTEGER NOT NULL REFERENCES users(id),
    UNIQUE (title, artist)
);

CREATE TABLE IF NOT EXISTS votes (
    id      INTEGER PRIMARY KEY,
    song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id),
    UNIQUE (song_id, user_id)
);

CREATE TABLE IF NOT EXISTS vetoes (
    id      INTEGER PRIMARY KEY,
    song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id),
    UNIQUE (song_id)
);

-- expiry is Unix time in (fractional) seconds.
CREATE TABLE IF NOT EXISTS sessions (
    token  TEXT PRIMARY KEY,
    data   BLOB NOT NULL,
    expiry REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS votes_user_idx      ON votes(user_id);
CREATE INDEX IF NOT EXISTS vetoes_user_idx     ON vetoes(user_id);
CREATE INDEX IF NOT EXISTS sessions_expiry_idx ON sessions(expiry);

PRAGMA user_version = 1;
";

//! SQL schema for the Floortrack SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS organizations (
    organization_id TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    email           TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS providers (
    provider_id     TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL REFERENCES organizations(organization_id),
    name            TEXT NOT NULL,
    credential      TEXT,
    email           TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS goal_bank (
    goal_id            TEXT NOT NULL PRIMARY KEY,
    organization_id    TEXT NOT NULL REFERENCES organizations(organization_id),
    category           TEXT NOT NULL,   -- free-text FEDC label
    description        TEXT NOT NULL,
    mastery_percentage INTEGER NOT NULL,
    across_sessions    INTEGER,         -- NULL -> engine default
    support_level      TEXT NOT NULL,   -- 'independent' | 'minimal' | 'moderate'
    mastery_baseline   INTEGER,
    created_at         TEXT NOT NULL
);

-- goal_list_version is bumped on every assignment mutation and checked by
-- conditional updates so concurrent writers see a conflict.
CREATE TABLE IF NOT EXISTS clients (
    client_id          TEXT PRIMARY KEY,
    organization_id    TEXT NOT NULL REFERENCES organizations(organization_id),
    name               TEXT NOT NULL,
    dob                TEXT,            -- ISO 8601 date
    diagnosis          TEXT,
    parent_name        TEXT,
    email              TEXT,
    phone              TEXT,
    assigned_providers TEXT NOT NULL DEFAULT '[]',   -- JSON array of uuids
    review_date        TEXT,
    status             TEXT NOT NULL DEFAULT 'active',
    goal_list_version  INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL
);

-- Assignments are never deleted; lifecycle transitions update status in
-- place and the old state is reconstructible from the audit trail.
CREATE TABLE IF NOT EXISTS goal_assignments (
    assignment_id       TEXT PRIMARY KEY,
    client_id           TEXT NOT NULL REFERENCES clients(client_id),
    goal_id             TEXT NOT NULL REFERENCES goal_bank(goal_id),
    goal_status         TEXT NOT NULL DEFAULT 'in_progress',
    target_date         TEXT,
    baseline_percentage INTEGER,
    success_rate        INTEGER,
    status_date         TEXT,
    reason              TEXT,
    assigned_at         TEXT NOT NULL
);

-- Hard backstop for the one-active-assignment-per-goal invariant; the
-- store also pre-checks inside the assignment transaction for a clean
-- error.
CREATE UNIQUE INDEX IF NOT EXISTS assignments_active_goal_idx
    ON goal_assignments(client_id, goal_id)
    WHERE goal_status = 'in_progress';

CREATE TABLE IF NOT EXISTS sessions (
    session_id       TEXT PRIMARY KEY,
    client_id        TEXT NOT NULL REFERENCES clients(client_id),
    provider_id      TEXT NOT NULL REFERENCES providers(provider_id),
    organization_id  TEXT NOT NULL REFERENCES organizations(organization_id),
    session_type     TEXT NOT NULL,
    date_of_session  TEXT NOT NULL,
    start_time       TEXT,
    end_time         TEXT,
    client_variables TEXT,
    created_at       TEXT NOT NULL
);

-- Data collections and their trials are strictly append-only.
-- No UPDATE or DELETE is ever issued against these tables.
CREATE TABLE IF NOT EXISTS data_collections (
    collection_id        TEXT PRIMARY KEY,
    session_id           TEXT NOT NULL REFERENCES sessions(session_id),
    client_id            TEXT NOT NULL REFERENCES clients(client_id),
    organization_id      TEXT NOT NULL REFERENCES organizations(organization_id),
    activities_engaged   TEXT NOT NULL DEFAULT '[]',  -- JSON array
    supports_observed    TEXT NOT NULL DEFAULT '[]',  -- JSON array
    duration_secs        INTEGER,
    provider_observation TEXT,
    recorded_at          TEXT NOT NULL   -- ISO 8601 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS trials (
    trial_id      TEXT PRIMARY KEY,
    collection_id TEXT NOT NULL REFERENCES data_collections(collection_id),
    client_id     TEXT NOT NULL REFERENCES clients(client_id),
    goal_id       TEXT NOT NULL REFERENCES goal_bank(goal_id),
    support_json  TEXT NOT NULL,   -- per-level {count, success, miss?} triples
    total         INTEGER NOT NULL,
    counter       INTEGER NOT NULL,
    recorded_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_events (
    event_id        TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL REFERENCES organizations(organization_id),
    actor_id        TEXT NOT NULL,
    action          TEXT NOT NULL,
    resource        TEXT NOT NULL,
    resource_id     TEXT,
    outcome         TEXT NOT NULL,
    detail          TEXT,
    recorded_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS assignments_client_idx  ON goal_assignments(client_id);
CREATE INDEX IF NOT EXISTS assignments_overdue_idx ON goal_assignments(goal_status, target_date);
CREATE INDEX IF NOT EXISTS sessions_client_idx     ON sessions(client_id);
CREATE INDEX IF NOT EXISTS collections_client_idx  ON data_collections(client_id, recorded_at);
CREATE INDEX IF NOT EXISTS collections_session_idx ON data_collections(session_id);
CREATE INDEX IF NOT EXISTS trials_client_goal_idx  ON trials(client_id, goal_id, recorded_at);
CREATE INDEX IF NOT EXISTS trials_collection_idx   ON trials(collection_id);
CREATE INDEX IF NOT EXISTS audit_org_idx           ON audit_events(organization_id, recorded_at);

PRAGMA user_version = 1;
";

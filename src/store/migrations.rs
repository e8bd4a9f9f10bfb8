pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS user_credentials (
    contact_number TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    address TEXT NOT NULL DEFAULT '',
    password TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('admin', 'user')),
    enable INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS campaign_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    month TEXT NOT NULL,
    state TEXT NOT NULL,
    district TEXT NOT NULL,
    villageZone TEXT NOT NULL,
    blockName TEXT NOT NULL,
    campaign_id TEXT NOT NULL,
    quantity REAL NOT NULL DEFAULT 0,
    amount REAL NOT NULL DEFAULT 0,
    date_added TEXT NOT NULL,
    user_id TEXT,
    UNIQUE (month, state, district, villageZone, blockName, campaign_id)
);
CREATE INDEX IF NOT EXISTS idx_campaign_location_month
    ON campaign_data(state, district, villageZone, blockName, month);
"#;

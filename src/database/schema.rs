pub const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS app_users (
        id INTEGER PRIMARY KEY,
        email TEXT,
        display_name TEXT,
        handle TEXT UNIQUE,
        avatar TEXT,
        roles TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS creatives (
        id INTEGER PRIMARY KEY,
        owner_id INTEGER NOT NULL,
        user_prompt TEXT NOT NULL,
        prompt TEXT NOT NULL,
        image_basis_path TEXT,
        images INTEGER NOT NULL,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        steps INTEGER NOT NULL,
        seed INTEGER,
        primary_artifact_id INTEGER,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT,
        FOREIGN KEY(owner_id) REFERENCES app_users(id)
    );

    CREATE TABLE IF NOT EXISTS creative_artifacts (
        id INTEGER PRIMARY KEY,
        creative_id INTEGER NOT NULL,
        file_name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        content_type TEXT NOT NULL,
        content_length INTEGER NOT NULL,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        seed INTEGER NOT NULL,
        prompt TEXT NOT NULL,
        high_res_artifact_id INTEGER,
        FOREIGN KEY(creative_id) REFERENCES creatives(id),
        FOREIGN KEY(high_res_artifact_id) REFERENCES creative_artifacts(id)
    );

    CREATE TABLE IF NOT EXISTS artists (
        id INTEGER PRIMARY KEY,
        first_name TEXT,
        last_name TEXT NOT NULL,
        year_died INTEGER,
        type TEXT
    );

    CREATE TABLE IF NOT EXISTS modifiers (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT
    );

    CREATE TABLE IF NOT EXISTS creative_artists (
        id INTEGER PRIMARY KEY,
        creative_id INTEGER NOT NULL,
        artist_id INTEGER NOT NULL,
        FOREIGN KEY(creative_id) REFERENCES creatives(id),
        FOREIGN KEY(artist_id) REFERENCES artists(id)
    );

    CREATE TABLE IF NOT EXISTS creative_modifiers (
        id INTEGER PRIMARY KEY,
        creative_id INTEGER NOT NULL,
        modifier_id INTEGER NOT NULL,
        FOREIGN KEY(creative_id) REFERENCES creatives(id),
        FOREIGN KEY(modifier_id) REFERENCES modifiers(id)
    );

    CREATE TABLE IF NOT EXISTS artifact_likes (
        id INTEGER PRIMARY KEY,
        app_user_id INTEGER NOT NULL,
        artifact_id INTEGER NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY(app_user_id) REFERENCES app_users(id),
        FOREIGN KEY(artifact_id) REFERENCES creative_artifacts(id),
        UNIQUE(app_user_id, artifact_id)
    );

    CREATE INDEX IF NOT EXISTS idx_creatives_owner ON creatives(owner_id);
    CREATE INDEX IF NOT EXISTS idx_artifacts_creative ON creative_artifacts(creative_id);
";

pub const SCHEMA: &str = r#"
-- Directories table: registered scan roots
CREATE TABLE IF NOT EXISTS directories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    scan_recursive INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Images table: one row per ingested file
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL UNIQUE,
    file_name TEXT NOT NULL,
    file_size INTEGER,

    -- Raster properties
    width INTEGER,
    height INTEGER,
    format TEXT,

    -- User state
    is_favorite INTEGER NOT NULL DEFAULT 0,
    rating INTEGER NOT NULL DEFAULT 0,

    -- EXIF data
    date_taken TEXT,
    camera_make TEXT,
    camera_model TEXT,
    lens_model TEXT,
    focal_length REAL,
    focal_length_35mm REAL,
    aperture REAL,
    shutter_speed TEXT,
    iso INTEGER,
    gps_latitude REAL,
    gps_longitude REAL,
    gps_altitude REAL,
    location TEXT,
    orientation TEXT,
    color_space TEXT,
    white_balance TEXT,
    metering_mode TEXT,
    exposure_program TEXT,
    flash TEXT,

    directory_id INTEGER,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (directory_id) REFERENCES directories(id) ON DELETE CASCADE
);

-- Indexes for common queries
CREATE INDEX IF NOT EXISTS idx_images_directory ON images(directory_id);
CREATE INDEX IF NOT EXISTS idx_images_favorite ON images(is_favorite);
CREATE INDEX IF NOT EXISTS idx_images_date_taken ON images(date_taken);

-- Thumbnails: one derived preview per image
CREATE TABLE IF NOT EXISTS thumbnails (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_id INTEGER NOT NULL UNIQUE,
    thumbnail_path TEXT NOT NULL,
    width INTEGER NOT NULL DEFAULT 150,
    height INTEGER NOT NULL DEFAULT 150,
    file_size INTEGER,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

-- Albums: user-curated collections (membership managed by the UI layer)
CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    cover_image_id INTEGER,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (cover_image_id) REFERENCES images(id) ON DELETE SET NULL
);

-- Album membership with manual ordering
CREATE TABLE IF NOT EXISTS album_images (
    album_id INTEGER NOT NULL,
    image_id INTEGER NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    added_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (album_id, image_id),
    FOREIGN KEY (album_id) REFERENCES albums(id) ON DELETE CASCADE,
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_album_images_album ON album_images(album_id);
"#;

/// Tables the health check expects after `initialize()`.
pub const REQUIRED_TABLES: &[&str] = &["directories", "images", "thumbnails", "albums", "album_images"];

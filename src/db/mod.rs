//! SQLite-backed record store for directories, images, and thumbnails.
//!
//! All paths are stored in normalized form (no trailing separator, `.`
//! and `..` segments resolved lexically); lookups normalize before
//! matching so spelling variants of the same path hit the same row.

mod schema;

use anyhow::{bail, Context, Result};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::path::{Component, Path, PathBuf};

pub use schema::SCHEMA;

/// A registered scan root.
#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub is_active: bool,
    pub scan_recursive: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One ingested image file.
#[derive(Debug, Clone, Default)]
pub struct ImageRecord {
    pub id: i64,
    pub file_path: String,
    pub file_name: String,
    pub file_size: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub format: Option<String>,
    pub is_favorite: bool,
    pub rating: i64,
    pub date_taken: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub focal_length: Option<f64>,
    pub focal_length_35mm: Option<f64>,
    pub aperture: Option<f64>,
    pub shutter_speed: Option<String>,
    pub iso: Option<i64>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_altitude: Option<f64>,
    pub location: Option<String>,
    pub orientation: Option<String>,
    pub color_space: Option<String>,
    pub white_balance: Option<String>,
    pub metering_mode: Option<String>,
    pub exposure_program: Option<String>,
    pub flash: Option<String>,
    pub directory_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Derived preview for one image.
#[derive(Debug, Clone)]
pub struct ThumbnailRecord {
    pub id: i64,
    pub image_id: i64,
    pub thumbnail_path: String,
    pub width: i64,
    pub height: i64,
    pub file_size: Option<i64>,
    pub created_at: String,
}

/// Fields for a new image row. EXIF fields default to `None` so callers
/// only fill what extraction produced.
#[derive(Debug, Clone, Default)]
pub struct NewImage {
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub date_taken: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub focal_length: Option<f64>,
    pub focal_length_35mm: Option<f64>,
    pub aperture: Option<f64>,
    pub shutter_speed: Option<String>,
    pub iso: Option<i64>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_altitude: Option<f64>,
    pub location: Option<String>,
    pub orientation: Option<String>,
    pub color_space: Option<String>,
    pub white_balance: Option<String>,
    pub metering_mode: Option<String>,
    pub exposure_program: Option<String>,
    pub flash: Option<String>,
    pub directory_id: i64,
}

/// Fields for a new thumbnail row.
#[derive(Debug, Clone)]
pub struct NewThumbnail {
    pub image_id: i64,
    pub thumbnail_path: String,
    pub width: u32,
    pub height: u32,
    pub file_size: i64,
}

/// Image listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    All,
    Favorites,
    Directory(i64),
}

const DIRECTORY_COLUMNS: &str =
    "id, path, name, is_active, scan_recursive, created_at, updated_at";

const IMAGE_COLUMNS: &str = "id, file_path, file_name, file_size, width, height, format, \
     is_favorite, rating, date_taken, camera_make, camera_model, lens_model, \
     focal_length, focal_length_35mm, aperture, shutter_speed, iso, \
     gps_latitude, gps_longitude, gps_altitude, location, orientation, \
     color_space, white_balance, metering_mode, exposure_program, flash, \
     directory_id, created_at, updated_at";

const THUMBNAIL_COLUMNS: &str =
    "id, image_id, thumbnail_path, width, height, file_size, created_at";

/// Lexically normalize a path: resolve `.` and `..` segments and drop
/// trailing separators without touching the filesystem (symlinks are
/// not resolved).
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // A `..` cancels a preceding normal segment, is dropped at the
            // root, and is otherwise kept (leading `..` cannot resolve).
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                None | Some(Component::ParentDir) => normalized.push(".."),
                _ => {}
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

fn path_key(path: &Path) -> String {
    normalize_path(path).to_string_lossy().into_owned()
}

fn directory_display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn row_to_directory(row: &Row) -> rusqlite::Result<DirectoryRecord> {
    Ok(DirectoryRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        name: row.get(2)?,
        is_active: row.get(3)?,
        scan_recursive: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_image(row: &Row) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        file_path: row.get(1)?,
        file_name: row.get(2)?,
        file_size: row.get(3)?,
        width: row.get(4)?,
        height: row.get(5)?,
        format: row.get(6)?,
        is_favorite: row.get(7)?,
        rating: row.get(8)?,
        date_taken: row.get(9)?,
        camera_make: row.get(10)?,
        camera_model: row.get(11)?,
        lens_model: row.get(12)?,
        focal_length: row.get(13)?,
        focal_length_35mm: row.get(14)?,
        aperture: row.get(15)?,
        shutter_speed: row.get(16)?,
        iso: row.get(17)?,
        gps_latitude: row.get(18)?,
        gps_longitude: row.get(19)?,
        gps_altitude: row.get(20)?,
        location: row.get(21)?,
        orientation: row.get(22)?,
        color_space: row.get(23)?,
        white_balance: row.get(24)?,
        metering_mode: row.get(25)?,
        exposure_program: row.get(26)?,
        flash: row.get(27)?,
        directory_id: row.get(28)?,
        created_at: row.get(29)?,
        updated_at: row.get(30)?,
    })
}

fn row_to_thumbnail(row: &Row) -> rusqlite::Result<ThumbnailRecord> {
    Ok(ThumbnailRecord {
        id: row.get(0)?,
        image_id: row.get(1)?,
        thumbnail_path: row.get(2)?,
        width: row.get(3)?,
        height: row.get(4)?,
        file_size: row.get(5)?,
        created_at: row.get(6)?,
    })
}

// ============================================================================
// Connection-level operations
//
// These take a plain `&Connection` (or `&mut` where a transaction is
// opened) and return `rusqlite::Result` so the scan pipeline can wrap
// failures in its own error type and control transaction boundaries.
// ============================================================================

pub fn directory_by_path(conn: &Connection, path: &Path) -> rusqlite::Result<Option<DirectoryRecord>> {
    directory_by_key(conn, &path_key(path))
}

fn directory_by_key(conn: &Connection, key: &str) -> rusqlite::Result<Option<DirectoryRecord>> {
    let result = conn.query_row(
        &format!("SELECT {DIRECTORY_COLUMNS} FROM directories WHERE path = ?"),
        [key],
        row_to_directory,
    );
    match result {
        Ok(dir) => Ok(Some(dir)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Look up a directory by normalized path, creating it with a derived
/// display name if absent. Lookup and insert share one transaction so
/// concurrent callers cannot race a duplicate path into the table.
pub fn ensure_directory(conn: &mut Connection, path: &Path) -> rusqlite::Result<DirectoryRecord> {
    let key = path_key(path);
    let tx = conn.transaction()?;
    if let Some(dir) = directory_by_key(&tx, &key)? {
        tx.commit()?;
        return Ok(dir);
    }
    let name = directory_display_name(Path::new(&key));
    tx.execute(
        "INSERT INTO directories (path, name) VALUES (?, ?)",
        params![key, name],
    )?;
    let id = tx.last_insert_rowid();
    let dir = tx.query_row(
        &format!("SELECT {DIRECTORY_COLUMNS} FROM directories WHERE id = ?"),
        [id],
        row_to_directory,
    )?;
    tx.commit()?;
    Ok(dir)
}

pub fn image_exists(conn: &Connection, path: &Path) -> rusqlite::Result<bool> {
    let result = conn.query_row(
        "SELECT 1 FROM images WHERE file_path = ?",
        [path_key(path)],
        |_| Ok(true),
    );
    match result {
        Ok(found) => Ok(found),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Insert an image row and return its assigned id. Callers run this
/// inside the per-file transaction so the image and its thumbnail row
/// commit or roll back together.
pub fn insert_image(conn: &Connection, image: &NewImage) -> rusqlite::Result<i64> {
    conn.execute(
        r#"
        INSERT INTO images (
            file_path, file_name, file_size, width, height, format,
            date_taken, camera_make, camera_model, lens_model,
            focal_length, focal_length_35mm, aperture, shutter_speed, iso,
            gps_latitude, gps_longitude, gps_altitude, location,
            orientation, color_space, white_balance, metering_mode,
            exposure_program, flash, directory_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            image.file_path,
            image.file_name,
            image.file_size,
            image.width,
            image.height,
            image.format,
            image.date_taken,
            image.camera_make,
            image.camera_model,
            image.lens_model,
            image.focal_length,
            image.focal_length_35mm,
            image.aperture,
            image.shutter_speed,
            image.iso,
            image.gps_latitude,
            image.gps_longitude,
            image.gps_altitude,
            image.location,
            image.orientation,
            image.color_space,
            image.white_balance,
            image.metering_mode,
            image.exposure_program,
            image.flash,
            image.directory_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_thumbnail(conn: &Connection, thumbnail: &NewThumbnail) -> rusqlite::Result<i64> {
    conn.execute(
        r#"
        INSERT INTO thumbnails (image_id, thumbnail_path, width, height, file_size)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![
            thumbnail.image_id,
            thumbnail.thumbnail_path,
            thumbnail.width,
            thumbnail.height,
            thumbnail.file_size,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn touch_directory(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE directories SET updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        [id],
    )?;
    Ok(())
}

// ============================================================================
// Store
// ============================================================================

pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Report tables missing from the opened database. Empty means the
    /// schema is in place.
    pub fn health_check(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for table in schema::REQUIRED_TABLES {
            let present: bool = self
                .conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
                    [table],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !present {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }

    /// Per-file transaction boundary for the ingestion pipeline.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    // ========================================================================
    // Directory operations
    // ========================================================================

    pub fn find_directory_by_path(&self, path: &Path) -> Result<Option<DirectoryRecord>> {
        Ok(directory_by_path(&self.conn, path)?)
    }

    pub fn find_or_create_directory(&mut self, path: &Path) -> Result<DirectoryRecord> {
        Ok(ensure_directory(&mut self.conn, path)?)
    }

    pub fn create_directory(&self, path: &Path, name: &str, recursive: bool) -> Result<DirectoryRecord> {
        let key = path_key(path);
        self.conn.execute(
            "INSERT INTO directories (path, name, scan_recursive) VALUES (?, ?, ?)",
            params![key, name, recursive],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_directory(id)?
            .context("Directory row missing after insert")
    }

    pub fn get_directory(&self, id: i64) -> Result<Option<DirectoryRecord>> {
        let result = self.conn.query_row(
            &format!("SELECT {DIRECTORY_COLUMNS} FROM directories WHERE id = ?"),
            [id],
            row_to_directory,
        );
        match result {
            Ok(dir) => Ok(Some(dir)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_directories(&self, include_inactive: bool) -> Result<Vec<DirectoryRecord>> {
        let mut sql = format!("SELECT {DIRECTORY_COLUMNS} FROM directories");
        if !include_inactive {
            sql.push_str(" WHERE is_active = 1");
        }
        sql.push_str(" ORDER BY path");
        let mut stmt = self.conn.prepare(&sql)?;
        let dirs = stmt
            .query_map([], row_to_directory)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(dirs)
    }

    /// Soft delete: clear the active flag, leaving image rows intact.
    pub fn deactivate_directory(&self, id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE directories SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            [id],
        )?;
        Ok(())
    }

    /// Hard delete: remove the directory row and let the cascade take
    /// its images, thumbnails, and album links. Returns the thumbnail
    /// file paths that no longer have rows so the caller can unlink
    /// the derivatives on disk.
    pub fn delete_directory(&mut self, id: i64) -> Result<Vec<PathBuf>> {
        let tx = self.conn.transaction()?;
        let orphaned = {
            let mut stmt = tx.prepare(
                r#"
                SELECT t.thumbnail_path
                FROM thumbnails t
                JOIN images i ON t.image_id = i.id
                WHERE i.directory_id = ?
                "#,
            )?;
            let paths: Vec<PathBuf> = stmt
                .query_map([id], |row| row.get::<_, String>(0))?
                .filter_map(|r| r.ok())
                .map(PathBuf::from)
                .collect();
            paths
        };
        tx.execute("DELETE FROM directories WHERE id = ?", [id])?;
        tx.commit()?;
        Ok(orphaned)
    }

    // ========================================================================
    // Image operations
    // ========================================================================

    pub fn image_exists(&self, path: &Path) -> Result<bool> {
        Ok(image_exists(&self.conn, path)?)
    }

    pub fn find_image_by_path(&self, path: &Path) -> Result<Option<ImageRecord>> {
        let result = self.conn.query_row(
            &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE file_path = ?"),
            [path_key(path)],
            row_to_image,
        );
        match result {
            Ok(image) => Ok(Some(image)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_images(&self, filter: ImageFilter) -> Result<Vec<ImageRecord>> {
        let mut sql = format!("SELECT {IMAGE_COLUMNS} FROM images");
        match filter {
            ImageFilter::All => {}
            ImageFilter::Favorites => sql.push_str(" WHERE is_favorite = 1"),
            ImageFilter::Directory(_) => sql.push_str(" WHERE directory_id = ?"),
        }
        sql.push_str(" ORDER BY id");
        let args: Vec<i64> = match filter {
            ImageFilter::Directory(id) => vec![id],
            _ => Vec::new(),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let images = stmt
            .query_map(params_from_iter(args), row_to_image)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(images)
    }

    pub fn set_favorite(&self, image_id: i64, favorite: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE images SET is_favorite = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![favorite, image_id],
        )?;
        if changed == 0 {
            bail!("no image with id {}", image_id);
        }
        Ok(())
    }

    /// Ratings are clamped to the 0-5 range.
    pub fn set_rating(&self, image_id: i64, rating: i32) -> Result<()> {
        let rating = rating.clamp(0, 5);
        let changed = self.conn.execute(
            "UPDATE images SET rating = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![rating, image_id],
        )?;
        if changed == 0 {
            bail!("no image with id {}", image_id);
        }
        Ok(())
    }

    pub fn count_images(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }

    // ========================================================================
    // Thumbnail operations
    // ========================================================================

    pub fn find_thumbnail_for_image(&self, image_id: i64) -> Result<Option<ThumbnailRecord>> {
        let result = self.conn.query_row(
            &format!("SELECT {THUMBNAIL_COLUMNS} FROM thumbnails WHERE image_id = ?"),
            [image_id],
            row_to_thumbnail,
        );
        match result {
            Ok(thumb) => Ok(Some(thumb)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

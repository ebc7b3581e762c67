//! Pictor: an image catalog that scans directories for photos, extracts
//! EXIF metadata, and keeps a thumbnail cache behind a SQLite store.

pub mod config;
pub mod coordinator;
pub mod db;
pub mod logging;
pub mod scanner;
pub mod tasks;

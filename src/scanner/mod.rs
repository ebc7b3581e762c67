pub mod discovery;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod metadata;
pub mod thumbnails;

use anyhow::Result;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{
    self, normalize_path, DirectoryRecord, NewImage, NewThumbnail, Store,
};

pub use discovery::discover_images;
pub use metadata::{extract_metadata, ImageMetadata};
pub use thumbnails::{GeneratedThumbnail, ThumbnailError, ThumbnailManager};

/// Why a single file could not be ingested. One file failing never
/// aborts the surrounding scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("thumbnail generation failed: {0}")]
    Thumbnail(#[from] ThumbnailError),
    #[error("catalog write failed: {0}")]
    Store(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Emitted after each file, whether it was ingested, skipped, or
    /// failed. `total` covers every discovered candidate across roots.
    Progress { current: usize, total: usize },
    /// Terminal event, emitted exactly once, also after cancellation.
    Completed { ingested: usize },
    Error { path: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub total: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum FileOutcome {
    Ingested(i64),
    Skipped,
}

pub struct Scanner {
    extensions: Vec<String>,
    thumbnails: ThumbnailManager,
}

impl Scanner {
    pub fn new(config: &Config) -> Self {
        Self {
            extensions: config.scanner.image_extensions.clone(),
            thumbnails: ThumbnailManager::new(&config.thumbnails),
        }
    }

    /// Walk the given roots and ingest every image file not yet in the
    /// catalog. Cancellation is honored between files; the `Completed`
    /// event is emitted even when the scan was cancelled or found
    /// nothing.
    pub fn scan_directories(
        &self,
        store: &mut Store,
        directories: &[DirectoryRecord],
        progress_tx: Option<mpsc::Sender<ScanEvent>>,
        cancel: &AtomicBool,
    ) -> Result<ScanResult> {
        // Discover everything up front so progress has a stable denominator
        let mut batches = Vec::new();
        for record in directories {
            let files = discover_images(
                Path::new(&record.path),
                &self.extensions,
                record.scan_recursive,
            );
            batches.push((record, files));
        }
        let total: usize = batches.iter().map(|(_, files)| files.len()).sum();

        info!(
            directories = directories.len(),
            candidates = total,
            "starting catalog scan"
        );

        let mut result = ScanResult {
            total,
            ingested: 0,
            skipped: 0,
            failed: 0,
        };
        let mut current = 0;

        'roots: for (record, files) in &batches {
            for path in files {
                if cancel.load(Ordering::Relaxed) {
                    info!("scan cancelled");
                    break 'roots;
                }

                current += 1;
                match self.ingest_file(store, record.id, path) {
                    Ok(FileOutcome::Ingested(image_id)) => {
                        debug!(image_id, path = %path.display(), "ingested image");
                        result.ingested += 1;
                    }
                    Ok(FileOutcome::Skipped) => {
                        result.skipped += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to ingest image");
                        result.failed += 1;
                        if let Some(ref tx) = progress_tx {
                            let _ = tx.send(ScanEvent::Error {
                                path: path.to_string_lossy().to_string(),
                                message: e.to_string(),
                            });
                        }
                    }
                }

                if let Some(ref tx) = progress_tx {
                    let _ = tx.send(ScanEvent::Progress { current, total });
                }
            }

            db::touch_directory(&store.conn, record.id)?;
        }

        info!(
            ingested = result.ingested,
            skipped = result.skipped,
            failed = result.failed,
            "scan finished"
        );

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(ScanEvent::Completed {
                ingested: result.ingested,
            });
        }

        Ok(result)
    }

    /// Ingest one file: read raster stats and EXIF, then write the image
    /// row and its thumbnail inside a single transaction so a failure
    /// at any point leaves no partial record behind.
    fn ingest_file(
        &self,
        store: &mut Store,
        directory_id: i64,
        path: &Path,
    ) -> Result<FileOutcome, ScanError> {
        if db::image_exists(&store.conn, path)? {
            return Ok(FileOutcome::Skipped);
        }

        let file_size = std::fs::metadata(path)?.len() as i64;

        let reader = image::ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format();
        let (width, height) = reader.into_dimensions()?;

        let format_label = format
            .map(|f| format!("{f:?}").to_uppercase())
            .or_else(|| path.extension().map(|e| e.to_string_lossy().to_uppercase()));

        let metadata = extract_metadata(path);

        let record = NewImage {
            file_path: normalize_path(path).to_string_lossy().into_owned(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_size,
            width: Some(width),
            height: Some(height),
            format: format_label,
            date_taken: metadata.date_taken,
            camera_make: metadata.camera_make,
            camera_model: metadata.camera_model,
            lens_model: metadata.lens_model,
            focal_length: metadata.focal_length,
            focal_length_35mm: metadata.focal_length_35mm,
            aperture: metadata.aperture,
            shutter_speed: metadata.shutter_speed,
            iso: metadata.iso,
            gps_latitude: metadata.gps_latitude,
            gps_longitude: metadata.gps_longitude,
            gps_altitude: metadata.gps_altitude,
            location: None,
            orientation: metadata.orientation,
            color_space: metadata.color_space,
            white_balance: metadata.white_balance,
            metering_mode: metadata.metering_mode,
            exposure_program: metadata.exposure_program,
            flash: metadata.flash,
            directory_id,
        };

        let tx = store.conn.transaction()?;
        let image_id = db::insert_image(&tx, &record)?;
        let thumb = self.thumbnails.generate(image_id, path)?;
        db::insert_thumbnail(
            &tx,
            &NewThumbnail {
                image_id,
                thumbnail_path: thumb.path.to_string_lossy().into_owned(),
                width: thumb.width,
                height: thumb.height,
                file_size: thumb.file_size,
            },
        )?;
        tx.commit()?;

        Ok(FileOutcome::Ingested(image_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn scanner_with_cache(cache: &Path) -> Scanner {
        let mut config = Config::default();
        config.thumbnails.path = cache.to_path_buf();
        Scanner::new(&config)
    }

    fn test_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn test_scan_ingests_images_with_metadata_and_thumbnails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.jpg"), fixtures::canon_exif_jpeg()).unwrap();
        fs::write(root.join("sub/b.png"), fixtures::plain_png(32, 16)).unwrap();
        fs::write(root.join(".hidden.jpg"), fixtures::plain_jpeg(8, 8)).unwrap();
        fs::write(root.join("notes.txt"), b"not an image").unwrap();

        let mut store = test_store();
        let record = store.find_or_create_directory(&root).unwrap();

        let scanner = scanner_with_cache(&dir.path().join("cache"));
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let result = scanner
            .scan_directories(&mut store, &[record.clone()], Some(tx), &cancel)
            .unwrap();

        assert_eq!(result.total, 2);
        assert_eq!(result.ingested, 2);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.failed, 0);

        let a = store
            .find_image_by_path(&root.join("a.jpg"))
            .unwrap()
            .unwrap();
        assert_eq!(a.camera_make.as_deref(), Some("Canon"));
        assert_eq!(a.iso, Some(100));
        assert!((a.aperture.unwrap() - 2.8).abs() < 1e-9);
        assert_eq!(a.shutter_speed.as_deref(), Some("1/500"));
        assert_eq!(a.orientation.as_deref(), Some("Rotate 90 CW"));
        assert_eq!(a.format.as_deref(), Some("JPEG"));
        assert_eq!((a.width, a.height), (Some(4), Some(4)));
        assert_eq!(a.directory_id, Some(record.id));

        let b = store
            .find_image_by_path(&root.join("sub/b.png"))
            .unwrap()
            .unwrap();
        assert!(b.camera_make.is_none());
        assert_eq!(b.format.as_deref(), Some("PNG"));
        assert_eq!((b.width, b.height), (Some(32), Some(16)));

        assert!(store
            .find_image_by_path(&root.join(".hidden.jpg"))
            .unwrap()
            .is_none());

        let thumb = store.find_thumbnail_for_image(a.id).unwrap().unwrap();
        assert!(Path::new(&thumb.thumbnail_path).exists());
        assert!(thumb.width <= 150 && thumb.height <= 150);

        let events: Vec<ScanEvent> = rx.try_iter().collect();
        assert!(matches!(
            events.last(),
            Some(ScanEvent::Completed { ingested: 2 })
        ));
        let progress: Vec<&ScanEvent> = events
            .iter()
            .filter(|e| matches!(e, ScanEvent::Progress { .. }))
            .collect();
        assert_eq!(progress.len(), 2);
        if let ScanEvent::Progress { current, total } = progress[0] {
            assert_eq!((*current, *total), (1, 2));
        }
        if let ScanEvent::Progress { current, total } = progress[1] {
            assert_eq!((*current, *total), (2, 2));
        }
    }

    #[test]
    fn test_rescan_skips_known_images() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.png"), fixtures::plain_png(20, 20)).unwrap();
        fs::write(root.join("b.png"), fixtures::plain_png(24, 24)).unwrap();

        let mut store = test_store();
        let record = store.find_or_create_directory(&root).unwrap();
        let scanner = scanner_with_cache(&dir.path().join("cache"));
        let cancel = AtomicBool::new(false);

        let first = scanner
            .scan_directories(&mut store, &[record.clone()], None, &cancel)
            .unwrap();
        assert_eq!(first.ingested, 2);

        let second = scanner
            .scan_directories(&mut store, &[record], None, &cancel)
            .unwrap();
        assert_eq!(second.total, 2);
        assert_eq!(second.ingested, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(store.count_images().unwrap(), 2);
    }

    #[test]
    fn test_rescan_picks_up_new_files_only() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.png"), fixtures::plain_png(20, 20)).unwrap();
        fs::write(root.join("b.png"), fixtures::plain_png(24, 24)).unwrap();

        let mut store = test_store();
        let record = store.find_or_create_directory(&root).unwrap();
        let scanner = scanner_with_cache(&dir.path().join("cache"));
        let cancel = AtomicBool::new(false);

        scanner
            .scan_directories(&mut store, &[record.clone()], None, &cancel)
            .unwrap();
        fs::write(root.join("c.png"), fixtures::plain_png(28, 28)).unwrap();

        let result = scanner
            .scan_directories(&mut store, &[record], None, &cancel)
            .unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.ingested, 1);
        assert_eq!(result.skipped, 2);
    }

    #[test]
    fn test_unreadable_file_fails_alone_and_leaves_no_partial_rows() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("good.png"), fixtures::plain_png(20, 20)).unwrap();
        // Intact header, truncated body: dimensions read fine, the
        // thumbnail decode fails, and the whole file rolls back
        let png = fixtures::plain_png(64, 64);
        fs::write(root.join("torn.png"), &png[..48]).unwrap();

        let mut store = test_store();
        let record = store.find_or_create_directory(&root).unwrap();
        let scanner = scanner_with_cache(&dir.path().join("cache"));
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);

        let result = scanner
            .scan_directories(&mut store, &[record], Some(tx), &cancel)
            .unwrap();

        assert_eq!(result.total, 2);
        assert_eq!(result.ingested, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(store.count_images().unwrap(), 1);
        assert!(store
            .find_image_by_path(&root.join("torn.png"))
            .unwrap()
            .is_none());

        let events: Vec<ScanEvent> = rx.try_iter().collect();
        let error = events
            .iter()
            .find_map(|e| match e {
                ScanEvent::Error { path, .. } => Some(path.clone()),
                _ => None,
            })
            .unwrap();
        assert!(error.ends_with("torn.png"));
        assert!(matches!(
            events.last(),
            Some(ScanEvent::Completed { ingested: 1 })
        ));
    }

    #[test]
    fn test_cancelled_scan_still_completes() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(&root).unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            fs::write(root.join(name), fixtures::plain_png(16, 16)).unwrap();
        }

        let mut store = test_store();
        let record = store.find_or_create_directory(&root).unwrap();
        let scanner = scanner_with_cache(&dir.path().join("cache"));
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(true);

        let result = scanner
            .scan_directories(&mut store, &[record], Some(tx), &cancel)
            .unwrap();

        assert_eq!(result.ingested, 0);
        assert_eq!(store.count_images().unwrap(), 0);

        let events: Vec<ScanEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events.first(),
            Some(ScanEvent::Completed { ingested: 0 })
        ));
    }

    #[test]
    fn test_non_recursive_root_ignores_subdirectories() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("top.png"), fixtures::plain_png(16, 16)).unwrap();
        fs::write(root.join("sub/deep.png"), fixtures::plain_png(16, 16)).unwrap();

        let mut store = test_store();
        let record = store.create_directory(&root, "Flat", false).unwrap();
        let scanner = scanner_with_cache(&dir.path().join("cache"));
        let cancel = AtomicBool::new(false);

        let result = scanner
            .scan_directories(&mut store, &[record], None, &cancel)
            .unwrap();

        assert_eq!(result.total, 1);
        assert!(store
            .find_image_by_path(&root.join("top.png"))
            .unwrap()
            .is_some());
        assert!(store
            .find_image_by_path(&root.join("sub/deep.png"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_progress_denominator_spans_all_roots() {
        let dir = tempdir().unwrap();
        let one = dir.path().join("one");
        let two = dir.path().join("two");
        fs::create_dir_all(&one).unwrap();
        fs::create_dir_all(&two).unwrap();
        fs::write(one.join("a.png"), fixtures::plain_png(16, 16)).unwrap();
        fs::write(two.join("b.png"), fixtures::plain_png(16, 16)).unwrap();

        let mut store = test_store();
        let first = store.find_or_create_directory(&one).unwrap();
        let second = store.find_or_create_directory(&two).unwrap();
        let scanner = scanner_with_cache(&dir.path().join("cache"));
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);

        let result = scanner
            .scan_directories(&mut store, &[first, second], Some(tx), &cancel)
            .unwrap();
        assert_eq!(result.ingested, 2);

        let currents: Vec<(usize, usize)> = rx
            .try_iter()
            .filter_map(|e| match e {
                ScanEvent::Progress { current, total } => Some((current, total)),
                _ => None,
            })
            .collect();
        assert_eq!(currents, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_missing_root_scans_to_empty_completion() {
        let dir = tempdir().unwrap();
        let mut store = test_store();
        let record = store
            .find_or_create_directory(&dir.path().join("nowhere"))
            .unwrap();
        let scanner = scanner_with_cache(&dir.path().join("cache"));
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);

        let result = scanner
            .scan_directories(&mut store, &[record], Some(tx), &cancel)
            .unwrap();

        assert_eq!(result.total, 0);
        assert_eq!(result.failed, 0);
        let events: Vec<ScanEvent> = rx.try_iter().collect();
        assert!(matches!(
            events.as_slice(),
            [ScanEvent::Completed { ingested: 0 }]
        ));
    }
}

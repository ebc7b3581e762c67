use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use pictor::config::Config;
use pictor::coordinator::{ScanCoordinator, ScanTarget};
use pictor::db::{ImageFilter, Store};
use pictor::logging;
use pictor::scanner::ScanEvent;

enum Command {
    Add {
        path: PathBuf,
        name: Option<String>,
        flat: bool,
    },
    List {
        all: bool,
    },
    Scan {
        path: Option<PathBuf>,
    },
    Images {
        directory: Option<i64>,
        favorites: bool,
    },
    Favorite {
        id: i64,
        unset: bool,
    },
    Rate {
        id: i64,
        rating: i32,
    },
    Remove {
        id: i64,
        purge: bool,
    },
}

struct CliArgs {
    config_path: Option<PathBuf>,
    command: Command,
}

fn exit_usage(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn parse_id(value: &str) -> i64 {
    value
        .parse()
        .unwrap_or_else(|_| exit_usage(&format!("invalid id: {}", value)))
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("pictor {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            command => {
                let command = parse_command(command, &args[i + 1..]);
                return CliArgs {
                    config_path,
                    command,
                };
            }
        }
        i += 1;
    }

    eprintln!("Error: no command given");
    print_help();
    std::process::exit(1);
}

fn parse_command(name: &str, rest: &[String]) -> Command {
    match name {
        "add" => {
            let mut path = None;
            let mut display_name = None;
            let mut flat = false;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--name" => {
                        if i + 1 < rest.len() {
                            display_name = Some(rest[i + 1].clone());
                            i += 1;
                        } else {
                            exit_usage("--name requires a value");
                        }
                    }
                    "--flat" => flat = true,
                    arg if path.is_none() && !arg.starts_with('-') => {
                        path = Some(PathBuf::from(arg))
                    }
                    arg => exit_usage(&format!("unexpected argument: {}", arg)),
                }
                i += 1;
            }
            match path {
                Some(path) => Command::Add {
                    path,
                    name: display_name,
                    flat,
                },
                None => exit_usage("add requires a directory path"),
            }
        }
        "list" => {
            let mut all = false;
            for arg in rest {
                match arg.as_str() {
                    "--all" => all = true,
                    other => exit_usage(&format!("unexpected argument: {}", other)),
                }
            }
            Command::List { all }
        }
        "scan" => {
            let mut path = None;
            for arg in rest {
                if path.is_none() && !arg.starts_with('-') {
                    path = Some(PathBuf::from(arg));
                } else {
                    exit_usage(&format!("unexpected argument: {}", arg));
                }
            }
            Command::Scan { path }
        }
        "images" => {
            let mut directory = None;
            let mut favorites = false;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--directory" => {
                        if i + 1 < rest.len() {
                            directory = Some(parse_id(&rest[i + 1]));
                            i += 1;
                        } else {
                            exit_usage("--directory requires an id");
                        }
                    }
                    "--favorites" => favorites = true,
                    other => exit_usage(&format!("unexpected argument: {}", other)),
                }
                i += 1;
            }
            Command::Images {
                directory,
                favorites,
            }
        }
        "favorite" => {
            let mut id = None;
            let mut unset = false;
            for arg in rest {
                match arg.as_str() {
                    "--unset" => unset = true,
                    other if id.is_none() => id = Some(parse_id(other)),
                    other => exit_usage(&format!("unexpected argument: {}", other)),
                }
            }
            match id {
                Some(id) => Command::Favorite { id, unset },
                None => exit_usage("favorite requires an image id"),
            }
        }
        "rate" => {
            if rest.len() != 2 {
                exit_usage("rate requires an image id and a rating");
            }
            Command::Rate {
                id: parse_id(&rest[0]),
                rating: rest[1]
                    .parse()
                    .unwrap_or_else(|_| exit_usage(&format!("invalid rating: {}", rest[1]))),
            }
        }
        "remove" => {
            let mut id = None;
            let mut purge = false;
            for arg in rest {
                match arg.as_str() {
                    "--purge" => purge = true,
                    other if id.is_none() => id = Some(parse_id(other)),
                    other => exit_usage(&format!("unexpected argument: {}", other)),
                }
            }
            match id {
                Some(id) => Command::Remove { id, purge },
                None => exit_usage("remove requires a directory id"),
            }
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"pictor - image catalog with EXIF-aware scanning

USAGE:
    pictor [OPTIONS] <COMMAND>

COMMANDS:
    add PATH [--name NAME] [--flat]        Register a directory (--flat scans without recursion)
    list [--all]                           List registered directories (--all includes inactive)
    scan [PATH]                            Scan all active directories, or a single path
    images [--directory ID] [--favorites]  List cataloged images
    favorite ID [--unset]                  Mark or unmark an image as favorite
    rate ID RATING                         Rate an image from 0 to 5
    remove ID [--purge]                    Deactivate a directory; --purge deletes its records
                                           and cached thumbnails

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PICTOR_CONFIG       Path to config file (overrides default location)
    PICTOR_LOG          Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/pictor/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    // A broken logging setup must not take the CLI down with it
    let _log_guard = logging::init(&Config::config_dir().join("logs"))
        .ok()
        .flatten();

    let config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    run(args.command, config)
}

fn run(command: Command, config: Config) -> Result<()> {
    let mut store = Store::open(&config.db_path)?;
    let missing = store.health_check()?;
    if !missing.is_empty() {
        tracing::info!(tables = %missing.join(", "), "initializing catalog schema");
    }
    store.initialize()?;

    match command {
        Command::Add { path, name, flat } => {
            let path = std::path::absolute(&path)?;
            if !path.is_dir() {
                bail!("{} is not a directory", path.display());
            }
            if store.find_directory_by_path(&path)?.is_some() {
                bail!("{} is already registered", path.display());
            }
            let display_name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.to_string_lossy().to_string())
            });
            let dir = store.create_directory(&path, &display_name, !flat)?;
            println!("Registered {} (id {})", dir.path, dir.id);
        }
        Command::List { all } => {
            let dirs = store.list_directories(all)?;
            if dirs.is_empty() {
                println!("No directories registered");
            }
            for dir in dirs {
                let mode = if dir.scan_recursive { "recursive" } else { "flat" };
                let state = if dir.is_active { "" } else { " (inactive)" };
                println!("{:>4}  {}  [{}]{}", dir.id, dir.path, mode, state);
            }
        }
        Command::Scan { path } => {
            // The scan worker opens its own connection.
            drop(store);
            return run_scan(config, path);
        }
        Command::Images {
            directory,
            favorites,
        } => {
            let filter = if favorites {
                ImageFilter::Favorites
            } else if let Some(id) = directory {
                ImageFilter::Directory(id)
            } else {
                ImageFilter::All
            };
            let images = store.list_images(filter)?;
            if images.is_empty() {
                println!("No images found");
            }
            for image in images {
                let marker = if image.is_favorite { "*" } else { " " };
                println!(
                    "{:>5} {} [{}] {}",
                    image.id, marker, image.rating, image.file_path
                );
            }
        }
        Command::Favorite { id, unset } => {
            store.set_favorite(id, !unset)?;
            if unset {
                println!("Removed favorite from image {}", id);
            } else {
                println!("Marked image {} as favorite", id);
            }
        }
        Command::Rate { id, rating } => {
            store.set_rating(id, rating)?;
            println!("Rated image {}", id);
        }
        Command::Remove { id, purge } => {
            let dir = store
                .get_directory(id)?
                .with_context(|| format!("no directory with id {}", id))?;
            if purge {
                let orphaned = store.delete_directory(id)?;
                let mut removed = 0;
                for path in &orphaned {
                    if std::fs::remove_file(path).is_ok() {
                        removed += 1;
                    }
                }
                println!("Removed {} and {} cached thumbnail(s)", dir.path, removed);
            } else {
                store.deactivate_directory(id)?;
                println!("Deactivated {}; images remain in the catalog", dir.path);
            }
        }
    }

    Ok(())
}

fn run_scan(config: Config, path: Option<PathBuf>) -> Result<()> {
    let target = match path {
        Some(path) => {
            let path = std::path::absolute(&path)?;
            if !path.is_dir() {
                bail!("{} is not a directory", path.display());
            }
            ScanTarget::Path(path)
        }
        None => ScanTarget::ActiveDirectories,
    };

    let mut coordinator = ScanCoordinator::new(config);
    coordinator.start_scan(target)?;

    let mut printer = ScanPrinter::default();
    while coordinator.is_scanning() {
        for event in coordinator.poll_events() {
            printer.handle(&event);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    for event in coordinator.poll_events() {
        printer.handle(&event);
    }

    if printer.failures > 0 {
        eprintln!("{} file(s) could not be ingested", printer.failures);
    }
    Ok(())
}

#[derive(Default)]
struct ScanPrinter {
    failures: usize,
    mid_line: bool,
}

impl ScanPrinter {
    fn handle(&mut self, event: &ScanEvent) {
        match event {
            ScanEvent::Progress { current, total } => {
                print!("\r{}/{} files processed", current, total);
                let _ = std::io::stdout().flush();
                self.mid_line = true;
            }
            ScanEvent::Error { path, message } => {
                if self.mid_line {
                    println!();
                    self.mid_line = false;
                }
                eprintln!("failed: {}: {}", path, message);
                self.failures += 1;
            }
            ScanEvent::Completed { ingested } => {
                if self.mid_line {
                    println!();
                    self.mid_line = false;
                }
                println!("Scan complete: {} new image(s)", ingested);
            }
        }
    }
}

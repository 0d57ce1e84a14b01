//! `slatecanvas`: inspect, upgrade and create board files.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use slatecanvas_core::codec::{self, BoardSnapshot, DecodeError, FORMAT_VERSION, FileError};
use slatecanvas_core::config::{Config, ConfigError};
use slatecanvas_core::element::ElementType;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid file format: {0}")]
    InvalidFormat(#[from] DecodeError),
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "slatecanvas", version, about = "Work with .slatecanvas board files")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show what a board file contains
    Inspect {
        file: PathBuf,
        /// Print the whole board as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rewrite a board file in the current format
    Upgrade {
        file: PathBuf,
        /// Where to write the result (defaults to overwriting FILE)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create an empty board file
    New {
        name: String,
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let stdout = io::stdout();
    match run(cli, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("slatecanvas: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    match cli.command {
        Command::Inspect { file, json } => inspect(&file, json, out),
        Command::Upgrade { file, output } => upgrade(&file, output.as_deref(), out),
        Command::New { name, dir } => create(&name, &dir, out),
        Command::Config => {
            writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
            Ok(())
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn inspect(path: &Path, json: bool, out: &mut impl Write) -> Result<(), CliError> {
    let bytes = read(path)?;
    let version = codec::format_version(&bytes)?;
    let snapshot = codec::decode(&bytes)?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&snapshot)?)?;
        return Ok(());
    }

    writeln!(out, "id:       {}", snapshot.id)?;
    writeln!(out, "name:     {}", snapshot.name)?;
    writeln!(out, "version:  {version}")?;
    writeln!(out, "elements: {}", snapshot.elements.len())?;
    for kind in ElementType::ALL {
        let count = snapshot
            .elements
            .iter()
            .filter(|e| e.element_type() == kind)
            .count();
        if count > 0 {
            writeln!(out, "  {:<8}{count}", kind.as_str())?;
        }
    }
    Ok(())
}

fn upgrade(path: &Path, output: Option<&Path>, out: &mut impl Write) -> Result<(), CliError> {
    let bytes = read(path)?;
    let version = codec::format_version(&bytes)?;
    let snapshot = codec::decode(&bytes)?;
    let target = output.unwrap_or(path);
    if version == FORMAT_VERSION && target == path {
        writeln!(out, "{} is already at version {FORMAT_VERSION}", path.display())?;
        return Ok(());
    }
    codec::export_to_file(target, &snapshot)?;
    log::info!("upgraded {} from version {version}", path.display());
    writeln!(out, "wrote {}", target.display())?;
    Ok(())
}

fn create(name: &str, dir: &Path, out: &mut impl Write) -> Result<(), CliError> {
    let snapshot = BoardSnapshot {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        elements: Vec::new(),
    };
    let path = codec::export_into(dir, &snapshot)?;
    writeln!(out, "{}", path.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use slatecanvas_core::element::Element;
    use tempfile::tempdir;

    fn sample_board() -> BoardSnapshot {
        BoardSnapshot {
            id: "board-1".into(),
            name: "Team Sync".into(),
            elements: vec![
                Element::rectangle(Point::new(0.0, 0.0), 40.0, 20.0),
                Element::rectangle(Point::new(50.0, 0.0), 40.0, 20.0),
                Element::text(Point::new(0.0, 60.0), "hello", 20.0, "Inter"),
            ],
        }
    }

    fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_inspect_summary() {
        let dir = tempdir().unwrap();
        let path = codec::export_into(dir.path(), &sample_board()).unwrap();

        let mut buffer = Vec::new();
        inspect(&path, false, &mut buffer).unwrap();
        let text = output(buffer);
        assert!(text.contains("name:     Team Sync"));
        assert!(text.contains(&format!("version:  {FORMAT_VERSION}")));
        assert!(text.contains("elements: 3"));
        assert!(text.contains("rect    2"));
        assert!(text.contains("text    1"));
        assert!(!text.contains("ellipse"));
    }

    #[test]
    fn test_inspect_json() {
        let dir = tempdir().unwrap();
        let board = sample_board();
        let path = codec::export_into(dir.path(), &board).unwrap();

        let mut buffer = Vec::new();
        inspect(&path, true, &mut buffer).unwrap();
        let parsed: BoardSnapshot = serde_json::from_str(&output(buffer)).unwrap();
        assert_eq!(parsed, board);
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.slatecanvas");
        fs::write(&path, [0xff, 0xff, 0xff]).unwrap();

        let err = inspect(&path, false, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().starts_with("invalid file format"));
    }

    #[test]
    fn test_upgrade_current_file_is_noop() {
        let dir = tempdir().unwrap();
        let path = codec::export_into(dir.path(), &sample_board()).unwrap();
        let before = fs::read(&path).unwrap();

        let mut buffer = Vec::new();
        upgrade(&path, None, &mut buffer).unwrap();
        assert!(output(buffer).contains("already at version"));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_upgrade_to_other_path() {
        let dir = tempdir().unwrap();
        let board = sample_board();
        let path = codec::export_into(dir.path(), &board).unwrap();
        let target = dir.path().join("copy.slatecanvas");

        upgrade(&path, Some(&target), &mut Vec::new()).unwrap();
        assert_eq!(codec::import_from_file(&target).unwrap(), board);
    }

    #[test]
    fn test_new_board() {
        let dir = tempdir().unwrap();
        let mut buffer = Vec::new();
        create("Q3 Roadmap!", dir.path(), &mut buffer).unwrap();

        let path = PathBuf::from(output(buffer).trim());
        assert_eq!(path.file_name().unwrap(), "q3_roadmap_.slatecanvas");
        let board = codec::import_from_file(&path).unwrap();
        assert_eq!(board.name, "Q3 Roadmap!");
        assert!(board.elements.is_empty());
        assert!(Uuid::parse_str(&board.id).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = inspect(&dir.path().join("nope.slatecanvas"), false, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }

    #[test]
    fn test_config_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "max_undo_steps": 7 }"#).unwrap();
        let cli = Cli::parse_from(["slatecanvas", "--config", path.to_str().unwrap(), "config"]);

        let mut buffer = Vec::new();
        run(cli, &mut buffer).unwrap();
        let printed: Config = serde_json::from_str(&output(buffer)).unwrap();
        assert_eq!(printed.max_undo_steps, 7);
    }
}

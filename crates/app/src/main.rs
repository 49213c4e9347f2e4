mod script;
mod telemetry;

use std::fmt;
use std::sync::Arc;

use proctor_core::model::{QuizId, StudentId};
use services::{
    Clock, GradingConfig, HttpQuizDataService, InMemoryQuizData, ProctorService, QuizDataService,
    SessionSettings, SimulatedHost,
};
use storage::repository::{FallbackKey, FallbackStore, Storage};
use tracing::{Level, info};

use crate::script::{QuizFile, Step};

const DEFAULT_DB_URL: &str = "sqlite://proctor.sqlite3";
const DEFAULT_LIST_LIMIT: u32 = 20;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    ConflictingQuizSource,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::ConflictingQuizSource => {
                write!(f, "use either --quiz <file> or --quiz-id <id>, not both")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<u64, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw: value })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- simulate --script <file> (--quiz <file> | --quiz-id <id>)");
    eprintln!("                               [--student-id <id>] [--db <sqlite_url>] [--json-logs]");
    eprintln!("  cargo run -p app -- recover  [--quiz-id <id> --student-id <id>] [--limit <n>]");
    eprintln!("                               [--db <sqlite_url>] [--json-logs]");
    eprintln!();
    eprintln!("simulate grades locally with --quiz; --quiz-id talks to PROCTOR_API_URL.");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --student-id 1");
    eprintln!("  --limit {DEFAULT_LIST_LIMIT}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PROCTOR_DB_URL, PROCTOR_API_URL, PROCTOR_API_TOKEN, PROCTOR_API_TIMEOUT_SECS,");
    eprintln!("  PROCTOR_REDIRECT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Simulate,
    Recover,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "simulate" => Some(Self::Simulate),
            "recover" => Some(Self::Recover),
            _ => None,
        }
    }
}

enum QuizSource {
    File(String),
    Remote(QuizId),
}

struct Args {
    db_url: String,
    json_logs: bool,
    quiz_source: Option<QuizSource>,
    script: Option<String>,
    quiz_id: Option<QuizId>,
    student_id: Option<StudentId>,
    limit: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("PROCTOR_DB_URL")
                .ok()
                .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
            json_logs: false,
            quiz_source: None,
            script: None,
            quiz_id: None,
            student_id: None,
            limit: DEFAULT_LIST_LIMIT,
        };
        let mut quiz_file = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--quiz" => quiz_file = Some(require_value(args, "--quiz")?),
                "--script" => parsed.script = Some(require_value(args, "--script")?),
                "--quiz-id" => parsed.quiz_id = Some(QuizId::new(parse_id(args, "--quiz-id")?)),
                "--student-id" => {
                    parsed.student_id = Some(StudentId::new(parse_id(args, "--student-id")?));
                }
                "--limit" => {
                    let raw = parse_id(args, "--limit")?;
                    parsed.limit = u32::try_from(raw).unwrap_or(u32::MAX);
                }
                "--json-logs" => parsed.json_logs = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        parsed.quiz_source = match (quiz_file, parsed.quiz_id) {
            (Some(_), Some(_)) => return Err(ArgsError::ConflictingQuizSource),
            (Some(path), None) => Some(QuizSource::File(path)),
            (None, Some(id)) => Some(QuizSource::Remote(id)),
            (None, None) => None,
        };
        Ok(parsed)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

async fn simulate(args: Args, storage: Storage) -> Result<(), Box<dyn std::error::Error>> {
    let script_path = args.script.ok_or(ArgsError::MissingFlag { flag: "--script" })?;
    let steps: Vec<Step> = read_json(&script_path)?;
    let source = args
        .quiz_source
        .ok_or(ArgsError::MissingFlag { flag: "--quiz" })?;
    let student_id = args.student_id.unwrap_or_else(|| StudentId::new(1));

    let (quiz_data, quiz_id): (Arc<dyn QuizDataService>, QuizId) = match source {
        QuizSource::File(path) => {
            let file: QuizFile = read_json(&path)?;
            let quiz_id = file.quiz.id();
            let local = InMemoryQuizData::new();
            local.insert_quiz(file.quiz, file.answer_key)?;
            (Arc::new(local), quiz_id)
        }
        QuizSource::Remote(quiz_id) => {
            let config = GradingConfig::from_env()?;
            info!(base_url = %config.base_url, "grading against remote quiz-data service");
            (Arc::new(HttpQuizDataService::new(config)?), quiz_id)
        }
    };

    let host = Arc::new(SimulatedHost::new());
    let service = ProctorService::new(
        Clock::system(),
        quiz_data,
        Arc::clone(&storage.fallback),
        host.clone(),
    )
    .with_settings(SessionSettings::from_env()?);

    let session = service.open_attempt(quiz_id, student_id).await?;
    info!(session_id = %session.session_id(), %quiz_id, %student_id, steps = steps.len(), "playing script");
    script::play(&steps, &session, &host).await?;

    if session.snapshot().state.has_latched() {
        session.settled().await?;
    }
    let last = session.close().await;
    println!("{}", serde_json::to_string_pretty(&last)?);
    Ok(())
}

async fn recover(args: Args, storage: Storage) -> Result<(), Box<dyn std::error::Error>> {
    match (args.quiz_id, args.student_id) {
        (Some(quiz_id), Some(student_id)) => {
            let key = FallbackKey::new(quiz_id, student_id);
            match storage.fallback.get(key).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => eprintln!("no fallback record for quiz {quiz_id}, student {student_id}"),
            }
        }
        (None, None) => {
            let records = storage.fallback.list(args.limit).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        (None, Some(_)) => return Err(ArgsError::MissingFlag { flag: "--quiz-id" }.into()),
        (Some(_), None) => return Err(ArgsError::MissingFlag { flag: "--student-id" }.into()),
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    telemetry::init_tracing(parsed.json_logs, Level::INFO);

    // Open + migrate SQLite here so services stay storage-agnostic.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    match cmd {
        Command::Simulate => simulate(parsed, storage).await,
        Command::Recover => recover(parsed, storage).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use lesson_core::model::{Course, CourseId, Milestone, Module, VideoRef};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    course_id: String,
    course_title: String,
    milestones: u32,
    modules_per_milestone: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidMilestones { raw: String },
    InvalidModules { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidMilestones { raw } => {
                write!(f, "invalid --milestones value: {raw}")
            }
            ArgsError::InvalidModules { raw } => write!(f, "invalid --modules value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LESSON_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut course_id =
            std::env::var("LESSON_COURSE_ID").unwrap_or_else(|_| "guitar-101".into());
        let mut course_title =
            std::env::var("LESSON_COURSE_TITLE").unwrap_or_else(|_| "Guitar Basics".into());
        let mut milestones = std::env::var("LESSON_MILESTONES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut modules_per_milestone = std::env::var("LESSON_MODULES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(4);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--course-id" => {
                    course_id = require_value(&mut args, "--course-id")?;
                }
                "--course-title" => {
                    course_title = require_value(&mut args, "--course-title")?;
                }
                "--milestones" => {
                    let value = require_value(&mut args, "--milestones")?;
                    milestones = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidMilestones { raw: value.clone() })?;
                }
                "--modules" => {
                    let value = require_value(&mut args, "--modules")?;
                    modules_per_milestone = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidModules { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            course_id,
            course_title,
            milestones,
            modules_per_milestone,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --course-id <id>          Course id to publish (default: guitar-101)");
    eprintln!("  --course-title <name>     Course title (default: Guitar Basics)");
    eprintln!("  --milestones <n>          Number of milestones (default: 3)");
    eprintln!("  --modules <n>             Modules per milestone (default: 4)");
    eprintln!("  --now <rfc3339>           Fixed publish time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!(
        "  LESSON_DB_URL, LESSON_COURSE_ID, LESSON_COURSE_TITLE, LESSON_MILESTONES, LESSON_MODULES"
    );
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let chapters = [
        "Getting Started",
        "Open Chords",
        "Strumming Patterns",
        "Scales",
        "First Songs",
    ];

    let mut milestones = Vec::new();
    for m in 0..args.milestones {
        let chapter = chapters[(m as usize) % chapters.len()];
        let mut modules = Vec::new();
        for i in 0..args.modules_per_milestone {
            let video = VideoRef::parse(format!(
                "https://videos.example/{}/{m}/{i}",
                args.course_id
            ))?;
            modules.push(Module::new(format!("{chapter}, Part {}", i + 1), video)?);
        }
        milestones.push(Milestone::new(chapter, modules)?);
    }

    let course = Course::new(
        CourseId::new(args.course_id.clone())?,
        args.course_title.clone(),
        milestones,
        now,
    )?;
    storage.courses.upsert_course(&course).await?;

    println!(
        "Seeded course {} with {} milestones and {} modules into {}",
        course.id(),
        course.milestones().len(),
        course.total_modules(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

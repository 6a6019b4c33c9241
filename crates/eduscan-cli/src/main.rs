mod backend;
mod commands;
mod config;
mod notify;
mod render;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{App, AttendArgs, FilterArgs, RegisterArgs, ThemeAction};
use config::{Config, Theme};
use render::Painter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eduscan", version, about = "EduScan face recognition attendance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage registered students
    #[command(subcommand)]
    Student(StudentCommand),
    /// Manage units (courses)
    #[command(subcommand)]
    Unit(UnitCommand),
    /// Run a face recognition attendance session
    Attend(AttendArgs),
    /// Run a voice-only attendance session
    Voice {
        /// Unit id or code; defaults to the prepared unit
        #[arg(short, long)]
        unit: Option<String>,
        /// Only accept students assigned to the unit
        #[arg(long)]
        assigned_only: bool,
    },
    /// Inspect, export or clear attendance records
    #[command(subcommand)]
    Attendance(AttendanceCommand),
    /// Show student, unit and attendance counts
    Summary,
    /// Show or change the colour theme
    Theme {
        #[command(subcommand)]
        action: Option<ThemeCommand>,
    },
    /// List capture devices and compiled features
    Devices,
}

#[derive(Subcommand)]
enum StudentCommand {
    /// Register a student from a photo or the camera
    Register(RegisterArgs),
    /// List registered students
    List {
        /// Filter by id or name
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one student
    Show { id: String },
    /// Delete a student and their media
    Remove {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum UnitCommand {
    /// Add a unit
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        code: String,
    },
    /// List units
    List,
    /// Delete a unit and its assignments
    Remove {
        /// Unit id or code
        unit: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Replace the students assigned to a unit
    Assign {
        /// Unit id or code
        unit: String,
        /// Student ids
        #[arg(required = true)]
        students: Vec<String>,
    },
    /// List students assigned to a unit
    Students { unit: String },
    /// Make a unit the active one and issue a session password
    Prepare { unit: String },
}

#[derive(Subcommand)]
enum AttendanceCommand {
    /// List records, newest first
    List(FilterArgs),
    /// Write records to a timestamped JSON file
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Delete every record
    Clear {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ThemeCommand {
    /// Switch between light and dark
    Toggle,
    /// Set the theme explicitly
    Set { theme: Theme },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    tracing::debug!(data_dir = %config.data_dir.display(), "configuration loaded");
    let painter = Painter::for_stdout(config.theme);
    let mut app = App::new(config, painter);

    match cli.command {
        Commands::Student(cmd) => match cmd {
            StudentCommand::Register(args) => commands::student_register(&app, args),
            StudentCommand::List { search } => commands::student_list(&app, search.as_deref()),
            StudentCommand::Show { id } => commands::student_show(&app, &id),
            StudentCommand::Remove { id, yes } => commands::student_remove(&app, &id, yes),
        },
        Commands::Unit(cmd) => match cmd {
            UnitCommand::Add { name, code } => commands::unit_add(&app, &name, &code),
            UnitCommand::List => commands::unit_list(&app),
            UnitCommand::Remove { unit, yes } => commands::unit_remove(&app, &unit, yes),
            UnitCommand::Assign { unit, students } => commands::unit_assign(&app, &unit, &students),
            UnitCommand::Students { unit } => commands::unit_students(&app, &unit),
            UnitCommand::Prepare { unit } => commands::unit_prepare(&app, &unit),
        },
        Commands::Attend(args) => commands::attend(&app, args).await,
        Commands::Voice { unit, assigned_only } => {
            commands::voice_attend(&app, unit.as_deref(), assigned_only)
        }
        Commands::Attendance(cmd) => match cmd {
            AttendanceCommand::List(filter) => commands::attendance_list(&app, &filter),
            AttendanceCommand::Export { filter, out } => {
                commands::attendance_export(&app, &filter, out.as_deref())
            }
            AttendanceCommand::Clear { yes } => commands::attendance_clear(&app, yes),
        },
        Commands::Summary => commands::summary(&app),
        Commands::Theme { action } => {
            let action = match action {
                None => ThemeAction::Show,
                Some(ThemeCommand::Toggle) => ThemeAction::Toggle,
                Some(ThemeCommand::Set { theme }) => ThemeAction::Set(theme),
            };
            commands::theme(&mut app, action)
        }
        Commands::Devices => commands::devices(&app),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_attend_flags() {
        let argv = ["eduscan", "attend", "-u", "CS301", "--max-frames", "10"];
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Attend(args) => {
                assert_eq!(args.unit.as_deref(), Some("CS301"));
                assert_eq!(args.max_frames, Some(10));
                assert!(!args.voice_fallback);
            }
            _ => panic!("expected attend"),
        }
    }

    #[test]
    fn test_parse_attendance_date_filter() {
        let argv = ["eduscan", "attendance", "list", "--date", "2024-01-10"];
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Attendance(AttendanceCommand::List(filter)) => {
                assert_eq!(filter.date, chrono::NaiveDate::from_ymd_opt(2024, 1, 10));
            }
            _ => panic!("expected attendance list"),
        }
    }
}

//! Subcommand handlers.

use crate::backend;
use crate::config::{Config, Theme};
use crate::notify::{self, messages, Notifier};
use crate::render::{Painter, Style};
use crate::session::{Session, SessionError, SessionUnit, VoiceOutcome};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use eduscan_core::encoder::encode_single;
use eduscan_core::{StudentRecord, VoiceEncoder, VoiceMatcher};
use eduscan_hw::FrameSource;
use eduscan_store::ledger::write_pretty_json;
use eduscan_store::{
    db, validate_id, ActiveUnit, EncodingStore, EventFilter, JsonLedger, Ledger, MediaDir, Roster,
    SqliteLedger, StoreError, Summary, TeeLedger, Unit, UnitRegistry,
};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// SQLite table mirrored to the JSON attendance log.
pub type AttendanceLedger = TeeLedger<SqliteLedger, JsonLedger>;

/// Minimum gap between two voice-fallback prompts during a camera session.
const FALLBACK_COOLDOWN: Duration = Duration::from_secs(5);

pub struct App {
    pub config: Config,
    pub painter: Painter,
}

impl App {
    pub fn new(config: Config, painter: Painter) -> Self {
        Self { config, painter }
    }

    fn connection(&self) -> Result<db::Connection> {
        let path = &self.config.db_path;
        db::open_database(path)
            .with_context(|| format!("failed to open database {}", path.display()))
    }

    pub fn students(&self) -> Result<EncodingStore> {
        let dir = &self.config.media_dir;
        let media = MediaDir::open(dir)
            .with_context(|| format!("failed to open media dir {}", dir.display()))?;
        Ok(EncodingStore::new(self.connection()?, media))
    }

    pub fn units(&self) -> Result<UnitRegistry> {
        Ok(UnitRegistry::new(self.connection()?))
    }

    pub fn ledger(&self) -> Result<AttendanceLedger> {
        Ok(TeeLedger::new(
            SqliteLedger::new(self.connection()?),
            JsonLedger::new(&self.config.attendance_log),
        ))
    }

    fn ok(&self, text: &str) {
        println!("{}", self.painter.paint(Style::Success, text));
    }

    fn warn(&self, text: &str) {
        println!("{}", self.painter.paint(Style::Warning, text));
    }

    fn error(&self, text: &str) {
        eprintln!("{}", self.painter.paint(Style::Error, text));
    }
}

// ── students ──────────────────────────────────────────────────────────────

#[derive(Debug, clap::Args)]
pub struct RegisterArgs {
    /// Unique student identifier (e.g. admission number)
    #[arg(long)]
    pub id: String,
    /// Display name
    #[arg(long)]
    pub name: String,
    /// Face photo; captured from the camera when omitted
    #[arg(long)]
    pub photo: Option<PathBuf>,
    /// Existing WAV voice sample
    #[arg(long, conflicts_with = "record_voice")]
    pub voice: Option<PathBuf>,
    /// Record a voice sample from the microphone
    #[arg(long)]
    pub record_voice: bool,
}

pub fn student_register(app: &App, args: RegisterArgs) -> Result<()> {
    validate_id(&args.id)?;
    let store = app.students()?;
    if store.exists(&args.id)? {
        return Err(StoreError::DuplicateKey(args.id).into());
    }

    let result = register_inner(app, &store, &args);
    if result.is_err() {
        if let Err(e) = store.media().remove(&args.id) {
            tracing::warn!(error = %e, student_id = %args.id, "failed to clean up media");
        }
    }
    let record = result?;

    app.ok(&format!(
        "Registered {} ({}){}",
        record.name,
        record.id,
        if record.voice_path.is_some() { " with voice sample" } else { "" }
    ));
    Ok(())
}

fn register_inner(app: &App, store: &EncodingStore, args: &RegisterArgs) -> Result<StudentRecord> {
    let mut encoder = backend::face_encoder(&app.config)?;
    let media = store.media();

    let (rgb, width, height) = match &args.photo {
        Some(photo) => {
            media.import_face(&args.id, photo)?;
            let img = image::open(photo)
                .with_context(|| format!("failed to read photo {}", photo.display()))?
                .to_rgb8();
            let (w, h) = img.dimensions();
            (img.into_raw(), w, h)
        }
        None => {
            let mut camera = backend::open_camera(&app.config)?;
            let frame = camera.read_frame().context("failed to capture photo")?;
            camera.release();
            frame
                .save(&media.face_path(&args.id)?)
                .context("failed to save captured photo")?;
            (frame.data, frame.width, frame.height)
        }
    };

    let embedding = encode_single(&mut encoder, &rgb, width, height)
        .context("could not compute a face encoding from the photo")?;

    let voice_path = if let Some(src) = &args.voice {
        Some(media.import_voice(&args.id, src)?)
    } else if args.record_voice {
        let dest = media.voice_path(&args.id)?;
        println!("Recording {}s voice sample, speak now...", app.config.voice_record_secs);
        backend::record_voice(&app.config, &dest)?;
        Some(dest)
    } else {
        None
    };

    let record = StudentRecord {
        id: args.id.clone(),
        name: args.name.trim().to_string(),
        embedding,
        voice_path,
    };
    store.save(&record)?;
    Ok(record)
}

pub fn student_list(app: &App, search: Option<&str>) -> Result<()> {
    let store = app.students()?;
    let students = match search {
        Some(text) => store.search(text)?,
        None => store.load_all()?,
    };
    if students.is_empty() {
        app.warn("No students registered.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = students
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.name.clone(),
                if s.voice_path.is_some() { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    println!("{}", app.painter.table(&["ID", "NAME", "VOICE"], &rows));
    Ok(())
}

pub fn student_show(app: &App, id: &str) -> Result<()> {
    let store = app.students()?;
    let Some(student) = store.get(id)? else {
        bail!(StoreError::StudentNotFound(id.to_string()));
    };

    let face = store.media().face_path(id)?;
    let heading = format!("{} ({})", student.name, student.id);
    println!("{}", app.painter.paint(Style::Heading, &heading));
    println!("  encoding:  {} dimensions", student.embedding.dim());
    println!(
        "  photo:     {}{}",
        face.display(),
        if face.exists() { "" } else { " (missing)" }
    );
    match &student.voice_path {
        Some(p) => println!("  voice:     {}", p.display()),
        None => println!("  voice:     none"),
    }

    let ledger = app.ledger()?;
    let events: Vec<_> = ledger
        .events(&EventFilter {
            text: Some(id.to_string()),
            ..Default::default()
        })?
        .into_iter()
        .filter(|e| e.student_id == id)
        .collect();
    println!("  attended:  {} session(s)", events.len());
    if let Some(last) = events.first() {
        println!(
            "  last seen: {} (unit {})",
            last.timestamp.format(eduscan_store::TIMESTAMP_FORMAT),
            last.unit_id
        );
    }
    Ok(())
}

pub fn student_remove(app: &App, id: &str, yes: bool) -> Result<()> {
    let store = app.students()?;
    let Some(student) = store.get(id)? else {
        app.warn(&format!("No student with id {id}."));
        return Ok(());
    };
    let question = format!("Delete {} ({}) and their media files?", student.name, id);
    if !confirm(&question, yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    store.delete(id)?;
    app.ok(&format!("Deleted {} ({}).", student.name, id));
    Ok(())
}

// ── units ─────────────────────────────────────────────────────────────────

pub fn unit_add(app: &App, name: &str, code: &str) -> Result<()> {
    let unit = app.units()?.add(name, code)?;
    app.ok(&format!(
        "Added unit {} {} (id {}).",
        unit.code, unit.name, unit.id
    ));
    Ok(())
}

pub fn unit_list(app: &App) -> Result<()> {
    let registry = app.units()?;
    let units = registry.list()?;
    if units.is_empty() {
        app.warn("No units defined.");
        return Ok(());
    }
    let active = ActiveUnit::load(&app.config.active_unit_path)
        .ok()
        .flatten();
    let mut rows = Vec::with_capacity(units.len());
    for unit in &units {
        let marker = match &active {
            Some(a) if a.unit_id == unit.id => "*",
            _ => "",
        };
        rows.push(vec![
            unit.id.to_string(),
            unit.code.clone(),
            unit.name.clone(),
            registry.students(unit.id)?.len().to_string(),
            marker.to_string(),
        ]);
    }
    println!("{}", app.painter.table(&["ID", "CODE", "NAME", "STUDENTS", "ACTIVE"], &rows));
    Ok(())
}

pub fn unit_remove(app: &App, key: &str, yes: bool) -> Result<()> {
    let registry = app.units()?;
    let unit = registry.resolve(key)?;
    let question = format!("Delete unit {} {} and its assignments?", unit.code, unit.name);
    if !confirm(&question, yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    registry.remove(unit.id)?;
    app.ok(&format!("Deleted unit {}.", unit.code));
    Ok(())
}

pub fn unit_assign(app: &App, key: &str, student_ids: &[String]) -> Result<()> {
    let registry = app.units()?;
    let unit = registry.resolve(key)?;
    registry.assign(unit.id, student_ids)?;
    app.ok(&format!(
        "{} student(s) assigned to {}.",
        student_ids.len(),
        unit.code
    ));
    Ok(())
}

pub fn unit_students(app: &App, key: &str) -> Result<()> {
    let registry = app.units()?;
    let unit = registry.resolve(key)?;
    let ids = registry.students(unit.id)?;
    if ids.is_empty() {
        app.warn(&format!("No students assigned to {}.", unit.code));
        return Ok(());
    }
    let store = app.students()?;
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let name = store.get(&id)?.map(|s| s.name).unwrap_or_default();
        rows.push(vec![id, name]);
    }
    println!("{}", app.painter.table(&["ID", "NAME"], &rows));
    Ok(())
}

pub fn unit_prepare(app: &App, key: &str) -> Result<()> {
    let unit = app.units()?.resolve(key)?;
    let mut rng = rand::thread_rng();
    let active = ActiveUnit::prepare(&unit, &app.config.active_unit_path, &mut rng)?;
    app.ok(&format!(
        "{} {} is ready for attendance.",
        active.unit_code, active.unit_name
    ));
    println!("Session password: {}", app.painter.paint(Style::Heading, &active.password));
    Ok(())
}

/// `--unit` when given, otherwise the prepared active unit.
fn session_unit(app: &App, key: Option<&str>) -> Result<Unit> {
    let registry = app.units()?;
    if let Some(key) = key {
        return Ok(registry.resolve(key)?);
    }
    let Some(active) = ActiveUnit::load(&app.config.active_unit_path)? else {
        bail!("no unit given and none prepared; pass --unit or run `eduscan unit prepare <unit>`");
    };
    registry.get(active.unit_id)?.ok_or_else(|| {
        anyhow::anyhow!("prepared unit {} no longer exists", active.unit_code)
    })
}

/// Students the session matches against. Fails before any model or device
/// is opened when nobody qualifies.
fn session_roster(
    app: &App,
    store: &EncodingStore,
    unit: &Unit,
    assigned_only: bool,
) -> Result<Vec<StudentRecord>> {
    let mut roster = store.load_all()?;
    if assigned_only {
        let assigned = app.units()?.students(unit.id)?;
        roster.retain(|s| assigned.contains(&s.id));
    }
    if roster.is_empty() {
        return Err(SessionError::NoStudents.into());
    }
    Ok(roster)
}

// ── attendance ────────────────────────────────────────────────────────────

#[derive(Debug, clap::Args)]
pub struct AttendArgs {
    /// Unit id or code; defaults to the prepared unit
    #[arg(short, long)]
    pub unit: Option<String>,
    /// Read frames from an image instead of the camera
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// Offer a voice check when a face is not recognised
    #[arg(long)]
    pub voice_fallback: bool,
    /// Only match students assigned to the unit
    #[arg(long)]
    pub assigned_only: bool,
    /// Stop after this many frames
    #[arg(long)]
    pub max_frames: Option<u64>,
}

pub async fn attend(app: &App, args: AttendArgs) -> Result<()> {
    let unit = session_unit(app, args.unit.as_deref())?;
    let store = app.students()?;
    let roster = session_roster(app, &store, &unit, args.assigned_only)?;

    let encoder = backend::face_encoder(&app.config)?;
    let mut voice = if args.voice_fallback || app.config.voice_fallback {
        match backend::voice_matcher(&app.config) {
            Ok(m) => Some(m),
            Err(e) => {
                app.error(&format!("Voice fallback disabled: {e:#}"));
                None
            }
        }
    } else {
        None
    };

    let source = backend::open_source(&app.config, args.image.as_deref())?;
    let notifier = notify::from_config(app.config.speech_enabled, &app.config.speech_command);
    let mut session = Session::new(
        encoder,
        app.ledger()?,
        notifier,
        app.config.tolerance,
        app.config.process_every,
    );
    session.start(
        SessionUnit {
            id: unit.ledger_id(),
            name: unit.name.clone(),
        },
        &roster,
        source,
    )?;

    println!(
        "{}",
        app.painter.paint(
            Style::Heading,
            &format!("Taking attendance for {} {}. Press Ctrl-C to stop.", unit.code, unit.name)
        )
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(app.config.frame_interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut frames = 0u64;
    let mut marked = 0usize;
    let mut last_prompt: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                let outcome = tokio::task::block_in_place(|| session.update());
                if outcome.frame_read {
                    frames += 1;
                }
                if outcome.processed {
                    tracing::trace!(
                        faces = outcome.faces,
                        marked = outcome.marked.len(),
                        duplicates = outcome.duplicates,
                        unrecognized = outcome.unrecognized,
                        "cycle"
                    );
                }
                for m in &outcome.marked {
                    marked += 1;
                    app.ok(&format!(
                        "Attendance marked for {} ({})",
                        m.name, m.student_id
                    ));
                }

                if outcome.unrecognized > 0 {
                    if let Some(matcher) = voice.as_mut() {
                        let due = last_prompt.map_or(true, |t| t.elapsed() >= FALLBACK_COOLDOWN);
                        if due {
                            session.notifier().announce(messages::face_not_recognized());
                            let lead = "Face not recognized.";
                            tokio::task::block_in_place(|| {
                                voice_round(app, &store, &mut session, matcher, lead)
                            })?;
                            last_prompt = Some(Instant::now());
                        }
                    }
                }

                if args.max_frames.is_some_and(|max| frames >= max) {
                    break;
                }
            }
        }
    }

    if let Some(unit) = session.unit() {
        tracing::info!(unit_id = %unit.id, frames, marked, "session ended");
    }
    session.stop();
    tracing::debug!(state = ?session.state(), "session closed");
    let today = chrono::Local::now().date_naive();
    let present = match session.ledger().count_on(today) {
        Ok(n) => n.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "could not count today's attendance");
            "?".to_string()
        }
    };
    println!(
        "Session ended: {frames} frame(s), {marked} student(s) marked, {present} present today."
    );
    Ok(())
}

pub fn voice_attend(app: &App, unit: Option<&str>, assigned_only: bool) -> Result<()> {
    let unit = session_unit(app, unit)?;
    let store = app.students()?;
    let roster = session_roster(app, &store, &unit, assigned_only)?;
    let mut matcher = backend::voice_matcher(&app.config)?;

    let notifier = notify::from_config(app.config.speech_enabled, &app.config.speech_command);
    let mut session = Session::new(
        (),
        app.ledger()?,
        notifier,
        app.config.tolerance,
        app.config.process_every,
    );
    session.start_voice_only(
        SessionUnit {
            id: unit.ledger_id(),
            name: unit.name.clone(),
        },
        &roster,
    )?;
    session.notifier().announce(messages::voice_session_started());
    let heading = format!(
        "Voice attendance for {} {}. Leave the name blank to finish.",
        unit.code, unit.name
    );
    println!("{}", app.painter.paint(Style::Heading, &heading));

    loop {
        match voice_round(app, &store, &mut session, &mut matcher, "")? {
            VoiceRound::Finished => break,
            VoiceRound::Continue => {}
        }
    }

    session.stop();
    Ok(())
}

enum VoiceRound {
    Continue,
    Finished,
}

/// Ask for a name or id, record a sample and verify it.
fn voice_round<E, L, N, V>(
    app: &App,
    store: &EncodingStore,
    session: &mut Session<E, L, N>,
    matcher: &mut VoiceMatcher<V>,
    lead: &str,
) -> Result<VoiceRound>
where
    L: Ledger,
    N: Notifier,
    V: VoiceEncoder,
{
    let question = format!("{lead} Student name or ID (blank to skip): ");
    let Some(text) = prompt(question.trim_start())? else {
        return Ok(VoiceRound::Finished);
    };

    let candidate = store
        .search(&text)?
        .into_iter()
        .find(|s| session.gallery().find(&s.id).is_some());
    let Some(candidate) = candidate else {
        session.notifier().announce(messages::student_not_found());
        app.warn(&format!("No student matching {text:?}."));
        return Ok(VoiceRound::Continue);
    };

    let sample = app.config.data_dir.join("voice_sample.wav");
    println!(
        "Recording {}s for {}, speak now...",
        app.config.voice_record_secs, candidate.name
    );
    if let Err(e) = backend::record_voice(&app.config, &sample) {
        app.error(&format!("Recording failed: {e:#}"));
        return Ok(VoiceRound::Continue);
    }

    let outcome = session.identify_by_voice(&candidate.id, &sample, matcher)?;
    if let Err(e) = std::fs::remove_file(&sample) {
        tracing::debug!(error = %e, "voice sample not removed");
    }

    match outcome {
        VoiceOutcome::Marked(m) => app.ok(&format!(
            "Attendance marked for {} ({}) by voice",
            m.name, m.student_id
        )),
        VoiceOutcome::AlreadyMarked(m) => {
            app.warn(&format!("{} already marked present", m.name))
        }
        VoiceOutcome::NotRecognized => app.warn("Voice not recognized. Try again."),
        VoiceOutcome::NoEnrolledSample => {
            app.warn(&format!("{} has no enrolled voice sample.", candidate.name))
        }
        VoiceOutcome::UnknownStudent => {
            app.warn(&format!("{} is not part of this session.", candidate.name))
        }
    }
    Ok(VoiceRound::Continue)
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct FilterArgs {
    /// Unit id or code
    #[arg(short, long)]
    pub unit: Option<String>,
    /// Day to show (YYYY-MM-DD)
    #[arg(short, long)]
    pub date: Option<NaiveDate>,
    /// Substring of a student id or name
    #[arg(short, long)]
    pub search: Option<String>,
}

fn event_filter(app: &App, args: &FilterArgs) -> Result<EventFilter> {
    let unit_id = match &args.unit {
        Some(key) => Some(app.units()?.resolve(key)?.ledger_id()),
        None => None,
    };
    Ok(EventFilter {
        unit_id,
        date: args.date,
        text: args.search.clone(),
    })
}

pub fn attendance_list(app: &App, args: &FilterArgs) -> Result<()> {
    let filter = event_filter(app, args)?;
    let events = app.ledger()?.events(&filter)?;
    if events.is_empty() {
        app.warn("No attendance records.");
        return Ok(());
    }

    let units = app.units()?.list()?;
    let unit_label = |id: &str| {
        units
            .iter()
            .find(|u| u.ledger_id() == id)
            .map(|u| u.code.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let rows: Vec<Vec<String>> = events
        .iter()
        .map(|e| {
            vec![
                e.timestamp.format(eduscan_store::TIMESTAMP_FORMAT).to_string(),
                e.student_id.clone(),
                e.name.clone(),
                unit_label(&e.unit_id),
            ]
        })
        .collect();
    println!("{}", app.painter.table(&["TIME", "ID", "NAME", "UNIT"], &rows));
    println!("{} record(s)", events.len());
    Ok(())
}

pub fn attendance_export(app: &App, args: &FilterArgs, out_dir: Option<&Path>) -> Result<()> {
    let filter = event_filter(app, args)?;
    let events = app.ledger()?.events(&filter)?;
    let dir = out_dir.unwrap_or(app.config.export_dir.as_path());
    let now = chrono::Local::now().naive_local();
    let path = dir.join(export_file_name(now));
    write_pretty_json(&path, &events)
        .with_context(|| format!("failed to write {}", path.display()))?;
    app.ok(&format!(
        "Exported {} record(s) to {}",
        events.len(),
        path.display()
    ));
    Ok(())
}

pub fn export_file_name(now: chrono::NaiveDateTime) -> String {
    format!("attendance_export_{}.json", now.format("%Y%m%d_%H%M%S"))
}

pub fn attendance_clear(app: &App, yes: bool) -> Result<()> {
    if !confirm("Delete ALL attendance records? This cannot be undone.", yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    let removed = app.ledger()?.clear_all()?;
    app.ok(&format!("Cleared {removed} attendance record(s)."));
    Ok(())
}

// ── misc ──────────────────────────────────────────────────────────────────

pub fn summary(app: &App) -> Result<()> {
    let conn = app.connection()?;
    let today = chrono::Local::now().date_naive();
    let summary = Summary::collect(&conn, today, &app.config.active_unit_path)?;

    println!("{}", app.painter.paint(Style::Heading, "EduScan"));
    println!("  students:          {}", summary.students);
    println!("  units:             {}", summary.units);
    println!("  attendance today:  {}", summary.attendance_today);
    match &summary.active_unit {
        Some(a) => println!(
            "  active unit:       {} {} (password {})",
            a.unit_code, a.unit_name, a.password
        ),
        None => println!("  active unit:       {}", app.painter.paint(Style::Muted, "none")),
    }
    Ok(())
}

pub fn theme(app: &mut App, action: ThemeAction) -> Result<()> {
    let next = match action {
        ThemeAction::Show => {
            println!("{}", app.config.theme.as_str());
            return Ok(());
        }
        ThemeAction::Toggle => app.config.theme.toggled(),
        ThemeAction::Set(theme) => theme,
    };
    app.config.save_theme(next)?;
    app.painter = Painter::for_stdout(next);
    app.ok(&format!("Theme set to {}.", next.as_str()));
    Ok(())
}

pub enum ThemeAction {
    Show,
    Toggle,
    Set(Theme),
}

pub fn devices(app: &App) -> Result<()> {
    let cameras = backend::list_cameras();
    println!("{}", app.painter.paint(Style::Heading, "Cameras"));
    if cameras.is_empty() {
        println!("  {}", app.painter.paint(Style::Muted, "none found"));
    }
    for (path, desc) in cameras {
        let marker = if path == app.config.camera_device { " (configured)" } else { "" };
        println!("  {path}  {desc}{marker}");
    }
    let features = backend::features();
    println!(
        "Features: {}",
        if features.is_empty() { "none".to_string() } else { features.join(", ") }
    );
    println!("Models:   {}", app.config.model_dir.display());
    Ok(())
}

/// Ask a yes/no question on the terminal. `--yes` skips the prompt; without
/// a terminal the answer is no.
fn confirm(question: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        bail!("refusing to continue without confirmation; pass --yes");
    }
    let answer = prompt(&format!("{question} [y/N] "))?;
    Ok(answer.is_some_and(|a| {
        let a = a.to_ascii_lowercase();
        a == "y" || a == "yes"
    }))
}

/// Read one trimmed line from stdin. `None` on EOF or a blank line.
fn prompt(question: &str) -> Result<Option<String>> {
    print!("{question}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use eduscan_store::AttendanceEvent;

    fn app(dir: &Path) -> App {
        let overrides = Overrides {
            data_dir: Some(dir.to_path_buf()),
            export_dir: Some(dir.join("exports")),
            speech_enabled: Some(false),
            ..Default::default()
        };
        let config = Config::resolve(overrides, dir.join("eduscan.toml"));
        App::new(config, Painter::new(Theme::Light, false))
    }

    #[test]
    fn test_export_file_name() {
        let now = chrono::NaiveDateTime::parse_from_str("2024-01-10 09:05:03", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        assert_eq!(
            export_file_name(now),
            "attendance_export_20240110_090503.json"
        );
    }

    #[test]
    fn test_confirm_with_yes_skips_prompt() {
        assert!(confirm("Delete?", true).unwrap());
    }

    #[test]
    fn test_session_unit_prefers_flag_then_active() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let registry = app.units().unwrap();
        let a = registry.add("Networks", "CS301").unwrap();
        let b = registry.add("Databases", "CS302").unwrap();

        assert!(session_unit(&app, None).is_err());

        let mut rng = rand::thread_rng();
        ActiveUnit::prepare(&b, &app.config.active_unit_path, &mut rng).unwrap();
        assert_eq!(session_unit(&app, None).unwrap(), b);
        assert_eq!(session_unit(&app, Some("cs301")).unwrap(), a);
    }

    #[test]
    fn test_ledger_writes_database_and_json_log() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let mut ledger = app.ledger().unwrap();
        let now = chrono::Local::now().naive_local();
        ledger
            .log(&AttendanceEvent::new("S1", "Alice", "1", now))
            .unwrap();

        assert!(app.config.attendance_log.exists());
        let ledger = app.ledger().unwrap();
        assert_eq!(ledger.count_on(now.date()).unwrap(), 1);
    }

    #[test]
    fn test_export_writes_filtered_events() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let unit = app.units().unwrap().add("Networks", "CS301").unwrap();
        let mut ledger = app.ledger().unwrap();
        let now = chrono::Local::now().naive_local();
        let unit_id = unit.ledger_id();
        ledger
            .log(&AttendanceEvent::new("S1", "Alice", unit_id, now))
            .unwrap();
        ledger
            .log(&AttendanceEvent::new("S2", "Bob", "99", now))
            .unwrap();

        let args = FilterArgs {
            unit: Some("CS301".into()),
            ..Default::default()
        };
        attendance_export(&app, &args, None).unwrap();

        let exported: Vec<_> = std::fs::read_dir(dir.path().join("exports"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(exported.len(), 1);
        let text = std::fs::read_to_string(&exported[0]).unwrap();
        let events: Vec<AttendanceEvent> = serde_json::from_str(&text).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].student_id, "S1");
    }

    #[test]
    fn test_clear_with_yes_empties_both_ledgers() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let now = chrono::Local::now().naive_local();
        app.ledger()
            .unwrap()
            .log(&AttendanceEvent::new("S1", "Alice", "1", now))
            .unwrap();

        attendance_clear(&app, true).unwrap();

        let ledger = app.ledger().unwrap();
        assert_eq!(ledger.count_on(now.date()).unwrap(), 0);
        assert!(ledger.mirror().load().unwrap().is_empty());
    }

    #[test]
    fn test_unit_remove_by_code() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        app.units().unwrap().add("Networks", "CS301").unwrap();
        unit_remove(&app, "CS301", true).unwrap();
        assert_eq!(app.units().unwrap().count().unwrap(), 0);
    }

    #[test]
    fn test_register_rejects_existing_id_before_touching_media() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let store = app.students().unwrap();
        store
            .save(&StudentRecord {
                id: "S1".into(),
                name: "Alice".into(),
                embedding: eduscan_core::Embedding::new(vec![1.0, 0.0]),
                voice_path: None,
            })
            .unwrap();
        let photo = store.media().face_path("S1").unwrap();
        std::fs::write(photo, b"original").unwrap();

        let err = student_register(
            &app,
            RegisterArgs {
                id: "S1".into(),
                name: "Impostor".into(),
                photo: Some(dir.path().join("other.png")),
                voice: None,
                record_voice: false,
            },
        )
        .unwrap_err();

        assert!(err.to_string().contains("already exists"));
        let photo = store.media().face_path("S1").unwrap();
        assert_eq!(std::fs::read(photo).unwrap(), b"original");
        assert_eq!(store.get("S1").unwrap().unwrap().name, "Alice");
    }

    #[test]
    fn test_register_with_path_id_leaves_other_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let store = app.students().unwrap();
        store
            .save(&StudentRecord {
                id: "S1".into(),
                name: "Alice".into(),
                embedding: eduscan_core::Embedding::new(vec![1.0, 0.0]),
                voice_path: None,
            })
            .unwrap();
        let alice_face = store.media().face_path("S1").unwrap();
        std::fs::write(&alice_face, b"alice").unwrap();
        let outside_face = dir.path().join("victim_face.jpg");
        let outside_voice = dir.path().join("victim_voice.wav");
        std::fs::write(&outside_face, b"jpeg").unwrap();
        std::fs::write(&outside_voice, b"wav").unwrap();
        let photo = dir.path().join("photo.png");
        image::RgbImage::new(4, 4).save(&photo).unwrap();

        for id in ["../victim", "../students/S1"] {
            let err = student_register(
                &app,
                RegisterArgs {
                    id: id.into(),
                    name: "Mallory".into(),
                    photo: Some(photo.clone()),
                    voice: None,
                    record_voice: false,
                },
            )
            .unwrap_err();
            assert!(err.to_string().contains("not a valid file name"), "{err}");
        }

        assert!(outside_face.exists());
        assert!(outside_voice.exists());
        assert_eq!(std::fs::read(&alice_face).unwrap(), b"alice");
    }

    #[tokio::test]
    async fn test_attend_without_students_fails_before_opening_source() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        app.units().unwrap().add("Networks", "CS301").unwrap();

        let err = attend(
            &app,
            AttendArgs {
                unit: Some("CS301".into()),
                image: Some(dir.path().join("missing.png")),
                voice_fallback: false,
                assigned_only: false,
                max_frames: Some(1),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::NoStudents)
        ));
    }
}

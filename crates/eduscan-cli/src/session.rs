//! The attendance capture loop.
//!
//! A [`Session`] owns one frame source, a face encoder, the ledger and a
//! notifier. The driver calls [`Session::update`] on a timer; each call reads
//! one frame and, on every `process_every`-th frame, matches the faces in it
//! against the gallery snapshot taken at [`Session::start`].
//!
//! A (student, unit) pair is written at most once per day: the session keeps
//! its own cache of pairs it has seen and asks the ledger before every write.

use crate::notify::{messages, Notifier};
use chrono::NaiveDateTime;
use eduscan_core::{
    FaceEncoder, Gallery, GalleryError, Matcher, NearestMatcher, VoiceEncoder, VoiceMatcher,
};
use eduscan_hw::FrameSource;
use eduscan_store::{AttendanceEvent, Ledger, Roster, StoreError};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no students are registered")]
    NoStudents,
    #[error("an attendance session is already running")]
    AlreadyRunning,
    #[error("no attendance session is running")]
    NotRunning,
    #[error("gallery: {0}")]
    Gallery(#[from] GalleryError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Source of attendance timestamps.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// The unit attendance is being taken for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUnit {
    /// Identifier written to the ledger.
    pub id: String,
    /// Name used in announcements.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marked {
    pub student_id: String,
    pub name: String,
}

/// What one [`Session::update`] call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    pub frame_read: bool,
    /// The frame went through detection (every `process_every`-th frame).
    pub processed: bool,
    pub faces: usize,
    pub marked: Vec<Marked>,
    /// Matches skipped because the student was already marked.
    pub duplicates: usize,
    pub unrecognized: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    Marked(Marked),
    AlreadyMarked(Marked),
    NotRecognized,
    NoEnrolledSample,
    UnknownStudent,
}

pub struct Session<E, L, N, C = SystemClock> {
    encoder: E,
    ledger: L,
    notifier: N,
    clock: C,
    matcher: NearestMatcher,
    process_every: u64,
    state: SessionState,
    unit: Option<SessionUnit>,
    gallery: Gallery,
    source: Option<Box<dyn FrameSource>>,
    frames_read: u64,
    marked: HashSet<(String, String)>,
}

impl<E, L: Ledger, N: Notifier> Session<E, L, N, SystemClock> {
    pub fn new(encoder: E, ledger: L, notifier: N, tolerance: f32, process_every: u32) -> Self {
        Self::with_clock(
            encoder,
            ledger,
            notifier,
            SystemClock,
            tolerance,
            process_every,
        )
    }
}

impl<E, L, N, C> Session<E, L, N, C> {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn unit(&self) -> Option<&SessionUnit> {
        self.unit.as_ref()
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// End the session: release the frame source and forget the cached
    /// pairs. Only a running session is affected.
    pub fn stop(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        self.state = SessionState::Stopped;
        if let Some(mut source) = self.source.take() {
            source.release();
        }
        self.marked.clear();
        tracing::info!(
            unit = self.unit.as_ref().map(|u| u.id.as_str()).unwrap_or(""),
            frames = self.frames_read,
            "attendance session stopped"
        );
    }
}

impl<E, L, N, C> Drop for Session<E, L, N, C> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<E, L: Ledger, N: Notifier, C: Clock> Session<E, L, N, C> {
    pub fn with_clock(
        encoder: E,
        ledger: L,
        notifier: N,
        clock: C,
        tolerance: f32,
        process_every: u32,
    ) -> Self {
        Self {
            encoder,
            ledger,
            notifier,
            clock,
            matcher: NearestMatcher::new(tolerance),
            process_every: u64::from(process_every.max(1)),
            state: SessionState::Idle,
            unit: None,
            gallery: Gallery::default(),
            source: None,
            frames_read: 0,
            marked: HashSet::new(),
        }
    }

    /// Start a session with no camera; students are marked through
    /// [`identify_by_voice`](Self::identify_by_voice) only.
    pub fn start_voice_only<R: Roster + ?Sized>(
        &mut self,
        unit: SessionUnit,
        roster: &R,
    ) -> Result<(), SessionError> {
        self.begin(unit, roster)
    }

    fn begin<R: Roster + ?Sized>(
        &mut self,
        unit: SessionUnit,
        roster: &R,
    ) -> Result<(), SessionError> {
        if self.state == SessionState::Running {
            return Err(SessionError::AlreadyRunning);
        }
        let records = roster.load_all()?;
        if records.is_empty() {
            tracing::warn!(unit = %unit.id, "no registered students; session not started");
            return Err(SessionError::NoStudents);
        }

        self.gallery = Gallery::new(records)?;
        self.frames_read = 0;
        self.marked.clear();
        self.state = SessionState::Running;
        tracing::info!(
            unit = %unit.id,
            students = self.gallery.len(),
            dim = self.gallery.dim(),
            "attendance session started"
        );
        self.notifier.announce(&messages::session_started(&unit.name));
        self.unit = Some(unit);
        Ok(())
    }

    /// Verify `candidate_id` by voice and mark them on success.
    pub fn identify_by_voice<V: VoiceEncoder>(
        &mut self,
        candidate_id: &str,
        sample: &Path,
        matcher: &mut VoiceMatcher<V>,
    ) -> Result<VoiceOutcome, SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::NotRunning);
        }
        let Some(record) = self.gallery.find(candidate_id) else {
            return Ok(VoiceOutcome::UnknownStudent);
        };
        let who = Marked {
            student_id: record.id.clone(),
            name: record.name.clone(),
        };
        let Some(enrolled) = record.voice_path.clone() else {
            tracing::info!(student_id = %who.student_id, "no enrolled voice sample");
            self.notifier.announce(messages::voice_not_recognized());
            return Ok(VoiceOutcome::NoEnrolledSample);
        };

        let accepted = match matcher.matches(&enrolled, sample) {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, student_id = %who.student_id, "voice comparison failed");
                false
            }
        };
        if !accepted {
            self.notifier.announce(messages::voice_not_recognized());
            return Ok(VoiceOutcome::NotRecognized);
        }

        if self.mark(&who.student_id, &who.name)? {
            Ok(VoiceOutcome::Marked(who))
        } else {
            self.notifier.announce(&messages::already_marked(&who.name));
            Ok(VoiceOutcome::AlreadyMarked(who))
        }
    }

    /// Write one attendance event unless the pair is already marked today.
    /// Returns whether a write happened.
    fn mark(&mut self, student_id: &str, name: &str) -> Result<bool, StoreError> {
        let Some(unit_id) = self.unit.as_ref().map(|u| u.id.clone()) else {
            return Ok(false);
        };
        let key = (student_id.to_string(), unit_id.clone());
        if self.marked.contains(&key) {
            return Ok(false);
        }

        let now = self.clock.now();
        if self.ledger.already_logged(student_id, &unit_id, now.date())? {
            tracing::debug!(student_id, unit = %unit_id, "already marked today");
            self.marked.insert(key);
            return Ok(false);
        }

        let event = AttendanceEvent::new(student_id, name, unit_id.as_str(), now);
        self.ledger.log(&event)?;
        self.marked.insert(key);
        tracing::info!(student_id, name, unit = %unit_id, "attendance marked");
        self.notifier.announce(&messages::marked(name));
        Ok(true)
    }
}

impl<E: FaceEncoder, L: Ledger, N: Notifier, C: Clock> Session<E, L, N, C> {
    /// Start taking attendance for `unit` from `source`.
    ///
    /// On failure the source is released before returning and no frame is
    /// read from it.
    pub fn start<R, S>(
        &mut self,
        unit: SessionUnit,
        roster: &R,
        source: S,
    ) -> Result<(), SessionError>
    where
        R: Roster + ?Sized,
        S: FrameSource + 'static,
    {
        let mut source: Box<dyn FrameSource> = Box::new(source);
        if let Err(e) = self.begin(unit, roster) {
            source.release();
            return Err(e);
        }
        self.source = Some(source);
        Ok(())
    }

    /// Run one capture cycle. Read and encoder failures skip the cycle.
    pub fn update(&mut self) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();
        if self.state != SessionState::Running {
            return outcome;
        }
        let Some(source) = self.source.as_mut() else {
            return outcome;
        };

        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame read failed; cycle skipped");
                return outcome;
            }
        };
        outcome.frame_read = true;
        self.frames_read += 1;
        if self.frames_read % self.process_every != 0 {
            return outcome;
        }
        outcome.processed = true;

        let faces = match self.encoder.encode(&frame.data, frame.width, frame.height) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    seq = frame.sequence,
                    "face encoding failed; cycle skipped"
                );
                return outcome;
            }
        };
        outcome.faces = faces.len();

        for face in &faces {
            let result = self.matcher.compare(&face.embedding, &self.gallery);
            let hit = result
                .index
                .filter(|_| result.matched)
                .and_then(|i| self.gallery.get(i))
                .map(|r| (r.id.clone(), r.name.clone()));

            let Some((student_id, name)) = hit else {
                tracing::debug!(distance = result.distance, "face not recognized");
                outcome.unrecognized += 1;
                continue;
            };

            match self.mark(&student_id, &name) {
                Ok(true) => outcome.marked.push(Marked { student_id, name }),
                Ok(false) => outcome.duplicates += 1,
                Err(e) => {
                    tracing::warn!(error = %e, student_id = %student_id, "attendance write failed");
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eduscan_core::{
        BoundingBox, EncoderError, Embedding, FaceEncoding, StudentRecord, VoiceError,
    };
    use eduscan_hw::{CameraError, Frame};
    use eduscan_store::{db, EventFilter, SqliteLedger};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::rc::Rc;

    struct FakeSource {
        released: Rc<Cell<bool>>,
        reads: Rc<Cell<usize>>,
        fail: bool,
    }

    impl FrameSource for FakeSource {
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            if self.released.get() {
                return Err(CameraError::Released);
            }
            self.reads.set(self.reads.get() + 1);
            if self.fail {
                return Err(CameraError::CaptureFailed("unplugged".into()));
            }
            let img = image::RgbImage::new(4, 4);
            Ok(Frame::from_image(img, self.reads.get() as u32))
        }

        fn release(&mut self) {
            self.released.set(true);
        }

        fn is_open(&self) -> bool {
            !self.released.get()
        }
    }

    struct SourceTap {
        released: Rc<Cell<bool>>,
        reads: Rc<Cell<usize>>,
    }

    fn source() -> (FakeSource, SourceTap) {
        let released = Rc::new(Cell::new(false));
        let reads = Rc::new(Cell::new(0));
        (
            FakeSource {
                released: released.clone(),
                reads: reads.clone(),
                fail: false,
            },
            SourceTap { released, reads },
        )
    }

    /// Reports the same faces on every call.
    struct FakeEncoder {
        faces: Rc<RefCell<Vec<Embedding>>>,
        calls: Rc<Cell<usize>>,
        fail: bool,
    }

    impl FaceEncoder for FakeEncoder {
        fn encode(&mut self, _: &[u8], _: u32, _: u32) -> Result<Vec<FaceEncoding>, EncoderError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(EncoderError::InferenceFailed("boom".into()));
            }
            Ok(self
                .faces
                .borrow()
                .iter()
                .map(|e| FaceEncoding {
                    face: BoundingBox {
                        x: 0.0,
                        y: 0.0,
                        width: 1.0,
                        height: 1.0,
                        confidence: 0.9,
                        landmarks: None,
                    },
                    embedding: e.clone(),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        said: RefCell<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn announce(&self, text: &str) {
            self.said.borrow_mut().push(text.to_string());
        }
    }

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    type TestSession = Session<FakeEncoder, SqliteLedger, RecordingNotifier, FixedClock>;

    struct Harness {
        session: TestSession,
        faces: Rc<RefCell<Vec<Embedding>>>,
        calls: Rc<Cell<usize>>,
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn harness_with(ledger: SqliteLedger, process_every: u32, fail_encoder: bool) -> Harness {
        let faces = Rc::new(RefCell::new(Vec::new()));
        let calls = Rc::new(Cell::new(0));
        let encoder = FakeEncoder {
            faces: faces.clone(),
            calls: calls.clone(),
            fail: fail_encoder,
        };
        let session = Session::with_clock(
            encoder,
            ledger,
            RecordingNotifier::default(),
            FixedClock(at("2024-01-10 09:00:00")),
            0.6,
            process_every,
        );
        Harness { session, faces, calls }
    }

    fn harness(process_every: u32) -> Harness {
        let ledger = SqliteLedger::new(db::open_in_memory().unwrap());
        harness_with(ledger, process_every, false)
    }

    fn student(id: &str, name: &str, values: Vec<f32>) -> StudentRecord {
        StudentRecord {
            id: id.into(),
            name: name.into(),
            embedding: Embedding::new(values),
            voice_path: None,
        }
    }

    fn roster() -> Vec<StudentRecord> {
        vec![
            student("S1", "Alice", vec![1.0, 0.0]),
            student("S2", "Bob", vec![0.0, 1.0]),
        ]
    }

    fn unit(id: &str) -> SessionUnit {
        SessionUnit {
            id: id.into(),
            name: format!("Unit {id}"),
        }
    }

    fn logged(session: &TestSession) -> usize {
        session
            .ledger()
            .events(&EventFilter::default())
            .unwrap()
            .len()
    }

    #[test]
    fn test_empty_roster_refuses_to_start() {
        let mut h = harness(1);
        let (src, tap) = source();
        let nobody: Vec<StudentRecord> = Vec::new();
        let err = h.session.start(unit("U1"), &nobody, src).unwrap_err();

        assert!(matches!(err, SessionError::NoStudents));
        assert!(tap.released.get());
        assert_eq!(tap.reads.get(), 0);
        assert_eq!(h.session.state(), SessionState::Idle);
        assert_eq!(h.session.update(), CycleOutcome::default());
        assert!(h.session.notifier().said.borrow().is_empty());
    }

    #[test]
    fn test_second_start_rejected() {
        let mut h = harness(1);
        let (first, first_tap) = source();
        let (second, second_tap) = source();
        h.session.start(unit("U1"), &roster(), first).unwrap();

        let err = h.session.start(unit("U2"), &roster(), second).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyRunning));
        assert!(second_tap.released.get());
        assert!(!first_tap.released.get());
        assert_eq!(h.session.unit().unwrap().id, "U1");
    }

    #[test]
    fn test_start_announces_unit() {
        let mut h = harness(1);
        let (src, _tap) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();
        assert_eq!(
            h.session.notifier().said.borrow().as_slice(),
            ["Attendance has started for Unit U1"]
        );
    }

    #[test]
    fn test_only_every_nth_frame_is_processed() {
        let mut h = harness(5);
        let (src, tap) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();

        for _ in 0..4 {
            let outcome = h.session.update();
            assert!(outcome.frame_read);
            assert!(!outcome.processed);
        }
        assert_eq!(h.calls.get(), 0);

        assert!(h.session.update().processed);
        assert_eq!(h.calls.get(), 1);
        assert_eq!(tap.reads.get(), 5);
    }

    #[test]
    fn test_match_is_written_once_per_run() {
        let mut h = harness(1);
        h.faces.borrow_mut().push(Embedding::new(vec![0.9, 0.1]));
        let (src, _tap) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();

        let first = h.session.update();
        assert_eq!(
            first.marked,
            vec![Marked { student_id: "S1".into(), name: "Alice".into() }]
        );

        let second = h.session.update();
        assert!(second.marked.is_empty());
        assert_eq!(second.duplicates, 1);

        assert_eq!(logged(&h.session), 1);
        let said = h.session.notifier().said.borrow();
        let marked = said.iter().filter(|s| *s == "Attendance marked for Alice");
        assert_eq!(marked.count(), 1);
    }

    #[test]
    fn test_ledger_entry_from_earlier_run_suppresses_write() {
        let mut ledger = SqliteLedger::new(db::open_in_memory().unwrap());
        let earlier = AttendanceEvent::new("S1", "Alice", "U1", at("2024-01-10 08:00:00"));
        ledger.log(&earlier).unwrap();
        let mut h = harness_with(ledger, 1, false);
        h.faces.borrow_mut().push(Embedding::new(vec![1.0, 0.0]));
        let (src, _tap) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();

        let outcome = h.session.update();
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(logged(&h.session), 1);
        assert_eq!(h.session.notifier().said.borrow().len(), 1);
    }

    #[test]
    fn test_far_face_is_unrecognized() {
        let mut h = harness(1);
        h.faces.borrow_mut().push(Embedding::new(vec![-1.0, -1.0]));
        let (src, _tap) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();

        let outcome = h.session.update();
        assert_eq!(outcome.faces, 1);
        assert_eq!(outcome.unrecognized, 1);
        assert_eq!(logged(&h.session), 0);
    }

    #[test]
    fn test_equal_distance_marks_first_student() {
        let mut h = harness(1);
        h.faces.borrow_mut().push(Embedding::new(vec![0.5, 0.5]));
        let twins = vec![
            student("S7", "First", vec![0.5, 0.5]),
            student("S8", "Second", vec![0.5, 0.5]),
        ];
        let (src, _tap) = source();
        h.session.start(unit("U1"), &twins, src).unwrap();

        let outcome = h.session.update();
        assert_eq!(outcome.marked.len(), 1);
        assert_eq!(outcome.marked[0].student_id, "S7");
    }

    #[test]
    fn test_several_faces_in_one_frame() {
        let mut h = harness(1);
        h.faces.borrow_mut().extend([
            Embedding::new(vec![1.0, 0.0]),
            Embedding::new(vec![0.0, 1.0]),
        ]);
        let (src, _tap) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();

        let outcome = h.session.update();
        assert_eq!(outcome.marked.len(), 2);
        assert_eq!(logged(&h.session), 2);
    }

    #[test]
    fn test_stop_is_idempotent_and_releases_source() {
        let mut h = harness(1);
        let (src, tap) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();

        h.session.stop();
        assert_eq!(h.session.state(), SessionState::Stopped);
        assert!(tap.released.get());
        h.session.stop();
        assert_eq!(h.session.state(), SessionState::Stopped);

        let reads = tap.reads.get();
        assert_eq!(h.session.update(), CycleOutcome::default());
        assert_eq!(tap.reads.get(), reads);
    }

    #[test]
    fn test_restart_for_another_unit_marks_again() {
        let mut h = harness(1);
        h.faces.borrow_mut().push(Embedding::new(vec![1.0, 0.0]));

        let (src, _p1) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();
        assert_eq!(h.session.update().marked.len(), 1);
        h.session.stop();

        let (src, _p2) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();
        assert_eq!(h.session.update().duplicates, 1);
        h.session.stop();

        let (src, _p3) = source();
        h.session.start(unit("U2"), &roster(), src).unwrap();
        assert_eq!(h.session.update().marked.len(), 1);
        assert_eq!(logged(&h.session), 2);
    }

    #[test]
    fn test_read_failure_skips_cycle() {
        let mut h = harness(1);
        let (mut src, _tap) = source();
        src.fail = true;
        h.session.start(unit("U1"), &roster(), src).unwrap();

        let outcome = h.session.update();
        assert!(!outcome.frame_read);
        assert_eq!(h.calls.get(), 0);
        assert_eq!(h.session.state(), SessionState::Running);
    }

    #[test]
    fn test_encoder_failure_skips_cycle() {
        let ledger = SqliteLedger::new(db::open_in_memory().unwrap());
        let mut h = harness_with(ledger, 1, true);
        let (src, _tap) = source();
        h.session.start(unit("U1"), &roster(), src).unwrap();

        let outcome = h.session.update();
        assert!(outcome.processed);
        assert_eq!(outcome.faces, 0);
        assert_eq!(h.session.state(), SessionState::Running);
    }

    struct TableVoice(HashMap<PathBuf, Embedding>);

    impl VoiceEncoder for TableVoice {
        fn embed(&mut self, wav_path: &Path) -> Result<Embedding, VoiceError> {
            self.0
                .get(wav_path)
                .cloned()
                .ok_or_else(|| VoiceError::EmptySample(wav_path.display().to_string()))
        }
    }

    #[test]
    fn test_voice_fallback_marks_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let enrolled = dir.path().join("S1_voice.wav");
        let good = dir.path().join("good.wav");
        let bad = dir.path().join("bad.wav");
        for p in [&enrolled, &good, &bad] {
            std::fs::write(p, b"RIFF").unwrap();
        }
        let mut table = HashMap::new();
        table.insert(enrolled.clone(), Embedding::new(vec![1.0, 0.0]));
        table.insert(good.clone(), Embedding::new(vec![0.95, 0.05]));
        table.insert(bad.clone(), Embedding::new(vec![0.0, 1.0]));
        let mut matcher = VoiceMatcher::new(TableVoice(table), 0.75);

        let mut people = roster();
        people[0].voice_path = Some(enrolled);

        let mut h = harness(1);
        assert!(matches!(
            h.session.identify_by_voice("S1", &good, &mut matcher),
            Err(SessionError::NotRunning)
        ));
        h.session.start_voice_only(unit("U1"), &people).unwrap();

        assert_eq!(
            h.session.identify_by_voice("S1", &bad, &mut matcher).unwrap(),
            VoiceOutcome::NotRecognized
        );
        assert!(matches!(
            h.session.identify_by_voice("S1", &good, &mut matcher).unwrap(),
            VoiceOutcome::Marked(m) if m.student_id == "S1"
        ));
        assert!(matches!(
            h.session.identify_by_voice("S1", &good, &mut matcher).unwrap(),
            VoiceOutcome::AlreadyMarked(_)
        ));
        assert_eq!(
            h.session.identify_by_voice("S2", &good, &mut matcher).unwrap(),
            VoiceOutcome::NoEnrolledSample
        );
        assert_eq!(
            h.session.identify_by_voice("S9", &good, &mut matcher).unwrap(),
            VoiceOutcome::UnknownStudent
        );
        assert_eq!(logged(&h.session), 1);

        let said = h.session.notifier().said.borrow();
        assert!(said.iter().any(|s| s == "Voice not recognized. Try again."));
        assert!(said.contains(&"Alice already marked present".to_string()));
    }
}

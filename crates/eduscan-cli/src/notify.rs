//! Spoken announcements.
//!
//! Speech runs on its own thread so a slow synthesiser never stalls the
//! recognition loop. Failures are logged and dropped.

use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// Announcements waiting for the synthesiser. Further ones are dropped.
const SPEECH_QUEUE: usize = 8;

pub trait Notifier {
    /// Queue `text` for announcement. Never blocks, never fails.
    fn announce(&self, text: &str);
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
    fn announce(&self, text: &str) {
        (**self).announce(text)
    }
}

/// Discards every announcement.
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn announce(&self, text: &str) {
        tracing::trace!(text, "announcement suppressed");
    }
}

/// Pipes announcements to an external text-to-speech command
/// (e.g. `espeak-ng`), one invocation per message.
pub struct SpeechNotifier {
    tx: Option<mpsc::Sender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl SpeechNotifier {
    /// Start the speech worker. `command` may carry arguments
    /// (`"espeak-ng -s 150"`); the text is appended as the last argument.
    pub fn spawn(command: &str) -> std::io::Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.collect();
        let (tx, mut rx) = mpsc::channel::<String>(SPEECH_QUEUE);

        let worker = std::thread::Builder::new()
            .name("eduscan-speech".into())
            .spawn(move || {
                while let Some(text) = rx.blocking_recv() {
                    speak(&program, &args, &text);
                }
                tracing::debug!("speech worker exiting");
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }
}

impl Notifier for SpeechNotifier {
    fn announce(&self, text: &str) {
        tracing::info!(text, "announce");
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.try_send(text.to_string()) {
                tracing::debug!(error = %e, "announcement dropped");
            }
        }
    }
}

impl Drop for SpeechNotifier {
    /// Let queued announcements finish before exit.
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn speak(program: &str, args: &[String], text: &str) {
    if program.is_empty() {
        return;
    }
    let status = Command::new(program)
        .args(args)
        .arg(text)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(s) if s.success() => {}
        Ok(s) => tracing::debug!(program, code = ?s.code(), "speech command failed"),
        Err(e) => tracing::debug!(program, error = %e, "speech command unavailable"),
    }
}

/// Notifier for the current configuration; falls back to silence when the
/// worker thread cannot be started.
pub fn from_config(enabled: bool, command: &str) -> Box<dyn Notifier> {
    if !enabled {
        return Box::new(SilentNotifier);
    }
    match SpeechNotifier::spawn(command) {
        Ok(n) => Box::new(n),
        Err(e) => {
            tracing::warn!(error = %e, "speech worker unavailable; announcements disabled");
            Box::new(SilentNotifier)
        }
    }
}

pub mod messages {
    pub fn session_started(unit_name: &str) -> String {
        format!("Attendance has started for {unit_name}")
    }

    pub fn voice_session_started() -> &'static str {
        "Voice attendance started. Say your name or student ID when ready."
    }

    pub fn marked(name: &str) -> String {
        format!("Attendance marked for {name}")
    }

    pub fn already_marked(name: &str) -> String {
        format!("{name} already marked present")
    }

    pub fn voice_not_recognized() -> &'static str {
        "Voice not recognized. Try again."
    }

    pub fn face_not_recognized() -> &'static str {
        "Face not recognized. Please speak your name."
    }

    pub fn student_not_found() -> &'static str {
        "Student not found. Please try again."
    }
}

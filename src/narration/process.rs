//! Text-to-speech through an installed command-line synthesiser.
//!
//! One dedicated OS thread, spawned on the first `speak`, plays utterances
//! strictly in arrival order by running the synthesiser program once per
//! utterance.  `cancel` bumps a generation counter so queued utterances are
//! skipped, and kills the program currently speaking.  A pending count tracks
//! accepted utterances that have not played out yet, for `wait_idle`.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use crate::capability::Capability;
use crate::config::NarrationConfig;

use super::{SpeechSynthesizer, SynthesisError, Utterance};

/// Programs probed on `PATH`, in order of preference.
const KNOWN_PROGRAMS: [&str; 3] = ["espeak-ng", "espeak", "say"];

/// Words per minute at rate `1.0` for the known programs.
const BASE_WPM: f32 = 175.0;

/// Find `program` as given (when it contains a path separator) or on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}

/// Command-line arguments for one utterance.
fn speech_args(program: &Path, utterance: &Utterance) -> Vec<String> {
    let wpm = (BASE_WPM * utterance.rate).round().max(1.0) as u32;
    let name = program
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    match name {
        "espeak" | "espeak-ng" => vec!["-s".into(), wpm.to_string(), utterance.text.clone()],
        "say" => vec!["-r".into(), wpm.to_string(), utterance.text.clone()],
        _ => vec![utterance.text.clone()],
    }
}

struct Playback {
    program: PathBuf,
    generation: AtomicU64,
    current: Mutex<Option<Child>>,
    pending: Mutex<usize>,
    idle: Condvar,
}

impl Playback {
    fn current(&self) -> MutexGuard<'_, Option<Child>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, usize> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accept(&self) {
        *self.pending() += 1;
    }

    fn done(&self) {
        let mut pending = self.pending();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let pending = self.pending();
        let _idle = self
            .idle
            .wait_while(pending, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn play(&self, generation: u64, utterance: Utterance) {
        // Held from the generation check until the child is stored, so a
        // concurrent `cancel` either skips this utterance or kills its child.
        let mut current = self.current();
        if generation != self.generation.load(Ordering::SeqCst) {
            return;
        }

        let spawned = Command::new(&self.program)
            .args(speech_args(&self.program, &utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                log::warn!("narration: cannot run {}: {e}", self.program.display());
                return;
            }
        };

        *current = Some(child);
        drop(current);

        // Poll so `cancel` can take the child out and kill it mid-utterance.
        loop {
            let finished = match self.current().as_mut() {
                Some(child) => !matches!(child.try_wait(), Ok(None)),
                None => true,
            };
            if finished {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        *self.current() = None;
    }
}

/// Speech synthesiser backed by an external program.
pub struct ProcessSynthesizer {
    playback: Arc<Playback>,
    queue: OnceLock<mpsc::Sender<(u64, Utterance)>>,
}

impl ProcessSynthesizer {
    pub fn new(program: PathBuf) -> Self {
        Self {
            playback: Arc::new(Playback {
                program,
                generation: AtomicU64::new(0),
                current: Mutex::new(None),
                pending: Mutex::new(0),
                idle: Condvar::new(),
            }),
            queue: OnceLock::new(),
        }
    }

    /// Locate a synthesiser according to `config`.
    pub fn detect(config: &NarrationConfig) -> Capability<Self> {
        if !config.enabled {
            return Capability::Unavailable;
        }

        let found = match &config.program {
            Some(program) => find_program(program),
            None => KNOWN_PROGRAMS.iter().find_map(|p| find_program(p)),
        };

        match found {
            Some(program) => {
                log::info!("narration: using {}", program.display());
                Capability::Available(Self::new(program))
            }
            None => Capability::Unavailable,
        }
    }

    pub fn program(&self) -> &Path {
        &self.playback.program
    }

    fn sender(&self) -> Result<&mpsc::Sender<(u64, Utterance)>, SynthesisError> {
        if let Some(tx) = self.queue.get() {
            return Ok(tx);
        }

        let (tx, rx) = mpsc::channel::<(u64, Utterance)>();
        let playback = Arc::clone(&self.playback);
        std::thread::Builder::new()
            .name("narration".into())
            .spawn(move || {
                while let Ok((generation, utterance)) = rx.recv() {
                    playback.play(generation, utterance);
                    playback.done();
                }
            })
            .map_err(|e| SynthesisError::Worker(e.to_string()))?;

        Ok(self.queue.get_or_init(|| tx))
    }
}

impl SpeechSynthesizer for ProcessSynthesizer {
    fn speak(&self, utterance: Utterance) -> Result<(), SynthesisError> {
        let generation = self.playback.generation.load(Ordering::SeqCst);
        let tx = self.sender()?;
        self.playback.accept();
        tx.send((generation, utterance)).map_err(|_| {
            self.playback.done();
            SynthesisError::WorkerGone
        })
    }

    fn cancel(&self) {
        self.playback.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut child) = self.playback.current().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn wait_idle(&self) {
        self.playback.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(rate: f32) -> Utterance {
        Utterance {
            text: "hello".into(),
            rate,
        }
    }

    #[test]
    fn espeak_gets_words_per_minute() {
        let args = speech_args(Path::new("/usr/bin/espeak-ng"), &utterance(1.1));
        assert_eq!(args, ["-s", "193", "hello"]);
    }

    #[test]
    fn say_uses_rate_flag() {
        let args = speech_args(Path::new("/usr/bin/say"), &utterance(1.0));
        assert_eq!(args, ["-r", "175", "hello"]);
    }

    #[test]
    fn unknown_program_gets_text_only() {
        let args = speech_args(Path::new("/opt/tts/speak"), &utterance(2.0));
        assert_eq!(args, ["hello"]);
    }

    #[test]
    fn missing_program_is_unavailable() {
        let config = NarrationConfig {
            program: Some("/definitely/not/installed/tts".into()),
            ..NarrationConfig::default()
        };
        assert!(!ProcessSynthesizer::detect(&config).is_available());
    }

    #[test]
    fn explicit_program_path_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("speak");
        std::fs::write(&program, "").unwrap();

        let config = NarrationConfig {
            program: Some(program.display().to_string()),
            ..NarrationConfig::default()
        };
        let Capability::Available(synth) = ProcessSynthesizer::detect(&config) else {
            panic!("explicit program should be detected");
        };
        assert_eq!(synth.program(), program.as_path());
    }

    #[test]
    fn cancel_before_first_use_is_harmless() {
        let synth = ProcessSynthesizer::new(PathBuf::from("/nonexistent/tts"));
        synth.cancel();
        assert_eq!(synth.playback.generation.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_idle_without_speech_returns() {
        let synth = ProcessSynthesizer::new(PathBuf::from("/nonexistent/tts"));
        synth.wait_idle();
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        /// A fake synthesiser that appends its last argument to `log`
        /// after sleeping `delay` seconds.
        fn script(dir: &Path, delay: &str) -> (PathBuf, PathBuf) {
            let log = dir.join("spoken.log");
            let program = dir.join("speak");
            let body = format!(
                "#!/bin/sh\nsleep {delay}\nfor last; do :; done\necho \"$last\" >> '{}'\n",
                log.display()
            );
            std::fs::write(&program, body).unwrap();
            std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
            (program, log)
        }

        fn say(synth: &ProcessSynthesizer, text: &str) {
            synth
                .speak(Utterance {
                    text: text.into(),
                    rate: 1.0,
                })
                .unwrap();
        }

        #[test]
        fn wait_idle_returns_after_queue_plays_out() {
            let dir = tempfile::tempdir().unwrap();
            let (program, log) = script(dir.path(), "0.1");
            let synth = ProcessSynthesizer::new(program);

            say(&synth, "first");
            say(&synth, "second");
            synth.wait_idle();

            let spoken = std::fs::read_to_string(&log).unwrap();
            assert_eq!(spoken.lines().collect::<Vec<_>>(), ["first", "second"]);
        }

        #[test]
        fn stale_generation_does_not_spawn() {
            let dir = tempfile::tempdir().unwrap();
            let (program, log) = script(dir.path(), "0");
            let synth = ProcessSynthesizer::new(program);
            synth.cancel();

            synth.playback.play(0, utterance(1.0));
            assert!(synth.playback.current().is_none());
            assert!(!log.exists());

            synth.playback.play(1, utterance(1.0));
            assert_eq!(std::fs::read_to_string(&log).unwrap(), "hello\n");
        }

        #[test]
        fn cancel_during_playback_kills_child_and_skips_queue() {
            let dir = tempfile::tempdir().unwrap();
            let (program, log) = script(dir.path(), "5");
            let synth = ProcessSynthesizer::new(program);

            say(&synth, "first");
            say(&synth, "second");

            let deadline = Instant::now() + Duration::from_secs(5);
            while synth.playback.current().is_none() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            assert!(synth.playback.current().is_some());

            let began = Instant::now();
            synth.cancel();
            synth.wait_idle();
            assert!(began.elapsed() < Duration::from_secs(4));
            assert!(!log.exists());
        }
    }
}

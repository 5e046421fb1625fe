//! On-device speech via the host's speech command.
//!
//! Zero network dependency, which is why the provider factory falls back here.
//! Each platform ships a speech CLI: `say` on macOS, `spd-say` or `espeak` on
//! Linux, and the System.Speech assembly through PowerShell on Windows. The
//! spawned process is tracked so `stop` can kill it mid-sentence; a watcher
//! thread fires `on_ended` when the process exits for any reason.

use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use super::{SpeakOptions, TtsProvider};

const ENABLE_LOGS: bool = true;
use crate::log_warn;

pub const PROVIDER_NAME: &str = "System Voice";

const WATCH_INTERVAL: Duration = Duration::from_millis(50);
/// Baseline words per minute at rate 1.0, scaled by the rate option.
const BASE_WPM: f32 = 175.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    #[cfg(target_os = "macos")]
    Say,
    #[cfg(all(unix, not(target_os = "macos")))]
    SpdSay,
    #[cfg(all(unix, not(target_os = "macos")))]
    Espeak,
    #[cfg(target_os = "windows")]
    PowerShell,
}

fn detect_engine() -> Option<Engine> {
    static DETECTED: OnceLock<Option<Engine>> = OnceLock::new();
    *DETECTED.get_or_init(probe_engines)
}

#[cfg(target_os = "macos")]
fn probe_engines() -> Option<Engine> {
    command_exists("say", &["-v", "?"]).then_some(Engine::Say)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn probe_engines() -> Option<Engine> {
    if command_exists("spd-say", &["--version"]) {
        Some(Engine::SpdSay)
    } else if command_exists("espeak", &["--version"]) {
        Some(Engine::Espeak)
    } else {
        None
    }
}

#[cfg(target_os = "windows")]
fn probe_engines() -> Option<Engine> {
    Some(Engine::PowerShell)
}

#[allow(dead_code)]
fn command_exists(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .is_ok()
}

pub struct SystemTtsProvider {
    current: Arc<Mutex<Option<Child>>>,
}

impl SystemTtsProvider {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Voices the host engine can speak with, for the settings voice picker.
    /// Best effort: an engine that cannot enumerate yields an empty list.
    pub fn list_voices() -> Vec<String> {
        match detect_engine() {
            #[cfg(target_os = "macos")]
            Some(Engine::Say) => parse_voice_column("say", &["-v", "?"], 0),
            #[cfg(all(unix, not(target_os = "macos")))]
            Some(Engine::Espeak) => parse_voice_column("espeak", &["--voices"], 3),
            _ => Vec::new(),
        }
    }
}

impl Default for SystemTtsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TtsProvider for SystemTtsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn speak(&self, text: &str, options: SpeakOptions) -> Result<()> {
        let engine = detect_engine().context("no speech engine found on this host")?;
        let mut command = build_command(engine, text, &options);
        command.stdout(Stdio::null()).stderr(Stdio::null());

        let child = command.spawn().context("failed to launch speech engine")?;
        {
            let mut guard = lock_current(&self.current);
            if let Some(mut old) = guard.take() {
                let _ = old.kill();
                let _ = old.wait();
            }
            *guard = Some(child);
        }

        let current = Arc::clone(&self.current);
        let on_ended = options.on_ended;
        thread::spawn(move || {
            loop {
                let finished = {
                    let mut guard = lock_current(&current);
                    match guard.as_mut() {
                        // Stopped externally
                        None => true,
                        Some(child) => match child.try_wait() {
                            Ok(Some(_)) => {
                                *guard = None;
                                true
                            }
                            Ok(None) => false,
                            Err(err) => {
                                log_warn!("speech process wait failed: {}", err);
                                *guard = None;
                                true
                            }
                        },
                    }
                };
                if finished {
                    break;
                }
                thread::sleep(WATCH_INTERVAL);
            }
            if let Some(ended) = on_ended {
                ended();
            }
        });

        Ok(())
    }

    fn stop(&self) {
        let mut guard = lock_current(&self.current);
        if let Some(mut child) = guard.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn is_available(&self) -> bool {
        detect_engine().is_some()
    }
}

fn lock_current(current: &Arc<Mutex<Option<Child>>>) -> std::sync::MutexGuard<'_, Option<Child>> {
    match current.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn build_command(engine: Engine, text: &str, options: &SpeakOptions) -> Command {
    match engine {
        #[cfg(target_os = "macos")]
        Engine::Say => {
            let mut cmd = Command::new("say");
            cmd.arg("-r")
                .arg(format!("{:.0}", BASE_WPM * options.rate.clamp(0.5, 2.0)));
            if let Some(voice) = &options.voice_id {
                cmd.arg("-v").arg(voice);
            }
            // Inline volume directive; `say` has no volume flag.
            cmd.arg(format!(
                "[[volm {:.2}]] {}",
                options.volume.clamp(0.0, 1.0),
                text
            ));
            cmd
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        Engine::SpdSay => {
            let mut cmd = Command::new("spd-say");
            // spd-say scales rate/pitch/volume from -100 to 100.
            cmd.arg("-w")
                .arg("-r")
                .arg(format!("{:.0}", ((options.rate - 1.0) * 100.0).clamp(-100.0, 100.0)))
                .arg("-p")
                .arg(format!("{:.0}", ((options.pitch - 1.0) * 100.0).clamp(-100.0, 100.0)))
                .arg("-i")
                .arg(format!("{:.0}", (options.volume * 200.0 - 100.0).clamp(-100.0, 100.0)));
            if let Some(voice) = &options.voice_id {
                cmd.arg("-y").arg(voice);
            }
            cmd.arg(text);
            cmd
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        Engine::Espeak => {
            let mut cmd = Command::new("espeak");
            cmd.arg("-s")
                .arg(format!("{:.0}", BASE_WPM * options.rate.clamp(0.5, 2.0)))
                .arg("-p")
                .arg(format!("{:.0}", (options.pitch * 50.0).clamp(0.0, 99.0)))
                .arg("-a")
                .arg(format!("{:.0}", (options.volume * 100.0).clamp(0.0, 200.0)));
            if let Some(voice) = &options.voice_id {
                cmd.arg("-v").arg(voice);
            }
            cmd.arg(text);
            cmd
        }
        #[cfg(target_os = "windows")]
        Engine::PowerShell => {
            let mut cmd = Command::new("powershell");
            let escaped = text.replace('\'', "''");
            let voice_line = options
                .voice_id
                .as_ref()
                .map(|v| format!("$s.SelectVoice('{}');", v.replace('\'', "''")))
                .unwrap_or_default();
            let script = format!(
                "Add-Type -AssemblyName System.Speech; \
                 $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                 $s.Volume = {:.0}; $s.Rate = {:.0}; {} $s.Speak('{}');",
                (options.volume * 100.0).clamp(0.0, 100.0),
                ((options.rate - 1.0) * 10.0).clamp(-10.0, 10.0),
                voice_line,
                escaped
            );
            cmd.arg("-NoProfile").arg("-Command").arg(script);
            cmd
        }
    }
}

#[allow(dead_code)]
fn parse_voice_column(program: &str, args: &[&str], column: usize) -> Vec<String> {
    let Ok(output) = Command::new(program).args(args).output() else {
        return Vec::new();
    };
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.split_whitespace().nth(column))
        .map(|v| v.to_string())
        .collect()
}

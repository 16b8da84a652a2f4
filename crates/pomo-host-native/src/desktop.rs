//! Desktop notification and sound output
//!
//! Notifications go through `notify-send` when present, otherwise to the
//! terminal. Sounds are played with the first available player:
//! - PipeWire (`pw-play`)
//! - PulseAudio (`paplay`)
//! - ALSA (`aplay`)
//!
//! falling back to the terminal bell.

use async_trait::async_trait;
use pomo_api::PermissionState;
use pomo_host_api::{HostError, HostResult, NotificationTransport, SoundCue, SoundPlayer};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// freedesktop sound theme files
const FOCUS_COMPLETE_SOUND: &str = "/usr/share/sounds/freedesktop/stereo/complete.oga";
const BREAK_COMPLETE_SOUND: &str = "/usr/share/sounds/freedesktop/stereo/bell.oga";

fn command_available(program: &str, probe: &[&str]) -> bool {
    Command::new(program)
        .args(probe)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// How notifications reach the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyBackend {
    /// libnotify via `notify-send`
    NotifySend,
    /// Printed to stderr
    Terminal,
}

impl NotifyBackend {
    pub fn detect() -> Self {
        if command_available("notify-send", &["--version"]) {
            info!("Using notify-send for notifications");
            Self::NotifySend
        } else {
            info!("notify-send not found, notifications go to the terminal");
            Self::Terminal
        }
    }
}

/// Desktop notification transport
pub struct DesktopNotifier {
    backend: NotifyBackend,
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self::with_backend(NotifyBackend::detect(), app_name)
    }

    pub fn with_backend(backend: NotifyBackend, app_name: impl Into<String>) -> Self {
        Self {
            backend,
            app_name: app_name.into(),
        }
    }

    pub fn backend(&self) -> NotifyBackend {
        self.backend
    }
}

#[async_trait]
impl NotificationTransport for DesktopNotifier {
    async fn request_permission(&self) -> PermissionState {
        // Desktop sessions have no permission prompt
        PermissionState::Granted
    }

    async fn show(&self, title: &str, body: &str) -> HostResult<()> {
        match self.backend {
            NotifyBackend::NotifySend => {
                let status = tokio::process::Command::new("notify-send")
                    .args(["--app-name", &self.app_name, title, body])
                    .status()
                    .await?;
                if !status.success() {
                    return Err(HostError::Internal(format!(
                        "notify-send exited with {}",
                        status
                    )));
                }
                debug!(title, "Notification sent via notify-send");
                Ok(())
            }
            NotifyBackend::Terminal => {
                eprintln!("[{}] {}: {}", self.app_name, title, body);
                Ok(())
            }
        }
    }
}

/// Detected sound player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundBackend {
    PipeWire,
    PulseAudio,
    Alsa,
    /// ASCII BEL on stderr
    Bell,
}

impl SoundBackend {
    pub fn detect() -> Self {
        if command_available("pw-play", &["--version"]) {
            info!("Detected PipeWire sound backend");
            return Self::PipeWire;
        }
        if command_available("pactl", &["info"]) {
            info!("Detected PulseAudio sound backend");
            return Self::PulseAudio;
        }
        if command_available("aplay", &["--version"]) {
            info!("Detected ALSA sound backend");
            return Self::Alsa;
        }

        warn!("No sound backend detected, using terminal bell");
        Self::Bell
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PipeWire => "pipewire",
            Self::PulseAudio => "pulseaudio",
            Self::Alsa => "alsa",
            Self::Bell => "bell",
        }
    }

    fn player(&self) -> Option<&'static str> {
        match self {
            Self::PipeWire => Some("pw-play"),
            Self::PulseAudio => Some("paplay"),
            Self::Alsa => Some("aplay"),
            Self::Bell => None,
        }
    }
}

/// Completion chime player
pub struct DesktopSound {
    backend: SoundBackend,
    focus_complete: PathBuf,
    break_complete: PathBuf,
}

impl DesktopSound {
    pub fn new() -> Self {
        Self::with_backend(SoundBackend::detect())
    }

    pub fn with_backend(backend: SoundBackend) -> Self {
        Self {
            backend,
            focus_complete: PathBuf::from(FOCUS_COMPLETE_SOUND),
            break_complete: PathBuf::from(BREAK_COMPLETE_SOUND),
        }
    }

    pub fn backend(&self) -> SoundBackend {
        self.backend
    }

    pub fn sound_file(&self, cue: SoundCue) -> &Path {
        match cue {
            SoundCue::FocusComplete => &self.focus_complete,
            SoundCue::BreakComplete => &self.break_complete,
        }
    }

    fn bell() -> HostResult<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

impl Default for DesktopSound {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SoundPlayer for DesktopSound {
    async fn play(&self, cue: SoundCue) -> HostResult<()> {
        let file = self.sound_file(cue);
        let player = match self.backend.player() {
            Some(player) if file.exists() => player,
            _ => return Self::bell(),
        };

        let status = tokio::process::Command::new(player)
            .arg(file)
            .status()
            .await?;
        if !status.success() {
            warn!(player, file = %file.display(), "Sound player failed, ringing bell");
            return Self::bell();
        }

        debug!(?cue, backend = self.backend.name(), "Played completion sound");
        Ok(())
    }
}

//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across
//! threads.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::playback::InterruptPolicy;

use super::AppPaths;

// ---------------------------------------------------------------------------
// SessionSettings
// ---------------------------------------------------------------------------

/// Settings for the live session itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Remote model/capability selector sent in the setup bundle.
    pub model: String,
    /// Prebuilt voice selector for the agent's audio responses.
    pub voice: String,
    /// Optional file whose contents become the system instruction.
    ///
    /// `None` means the caller supplies the instruction directly (the demo
    /// binary falls back to a built-in default).
    pub instruction_file: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-native-audio-preview-09-2025".into(),
            voice: "Fenrir".into(),
            instruction_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioSettings
// ---------------------------------------------------------------------------

/// Settings for the capture and playback pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// PCM rate of outbound frames in Hz (what the remote service expects
    /// on its input).
    pub input_sample_rate: u32,
    /// PCM rate of inbound chunks in Hz (what the remote service produces).
    pub output_sample_rate: u32,
    /// Samples per outbound frame at `input_sample_rate`.
    pub frame_samples: usize,
    /// Bound of the outbound frame queue; the oldest frame is dropped when
    /// the transport falls this far behind.
    pub max_queued_frames: usize,
    /// What happens to the playback slot clock on a barge-in.
    pub interrupt_policy: InterruptPolicy,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
            frame_samples: 4_096,
            max_queued_frames: 32,
            interrupt_policy: InterruptPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TransportSettings
// ---------------------------------------------------------------------------

/// Settings for the WebSocket transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// WebSocket endpoint of the live speech service, without the credential
    /// query parameter.
    pub endpoint: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_live::config::AppConfig;
///
/// // Load (returns Default when the file is missing)
/// let config = AppConfig::load().unwrap();
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Opaque API credential.  `None` or empty makes `connect` fail with a
    /// missing-credential error; the demo binary also honours the
    /// `GEMINI_API_KEY` environment variable.
    pub api_key: Option<String>,
    /// Session settings (model, voice, instruction source).
    pub session: SessionSettings,
    /// Capture / playback pipeline settings.
    pub audio: AudioSettings,
    /// Transport settings.
    pub transport: TransportSettings,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// A default `AppConfig` must survive a TOML round trip unchanged.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.api_key, loaded.api_key);
        assert_eq!(original.session.model, loaded.session.model);
        assert_eq!(original.session.voice, loaded.session.voice);
        assert_eq!(
            original.audio.input_sample_rate,
            loaded.audio.input_sample_rate
        );
        assert_eq!(
            original.audio.output_sample_rate,
            loaded.audio.output_sample_rate
        );
        assert_eq!(original.audio.frame_samples, loaded.audio.frame_samples);
        assert_eq!(
            original.audio.max_queued_frames,
            loaded.audio.max_queued_frames
        );
        assert_eq!(
            original.audio.interrupt_policy,
            loaded.audio.interrupt_policy
        );
        assert_eq!(original.transport.endpoint, loaded.transport.endpoint);
    }

    /// `load_from` on a non-existent path must return `Default` without
    /// error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.session.model, default.session.model);
        assert_eq!(
            config.audio.input_sample_rate,
            default.audio.input_sample_rate
        );
        assert_eq!(config.transport.endpoint, default.transport.endpoint);
    }

    /// Default values match the wire contract of the remote service.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.session.voice, "Fenrir");
        assert_eq!(cfg.audio.input_sample_rate, 16_000);
        assert_eq!(cfg.audio.output_sample_rate, 24_000);
        assert_eq!(cfg.audio.frame_samples, 4_096);
        assert_eq!(cfg.audio.max_queued_frames, 32);
        assert_eq!(cfg.audio.interrupt_policy, InterruptPolicy::ResetToZero);
        assert!(cfg.transport.endpoint.starts_with("wss://"));
    }

    /// Modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.api_key = Some("test-credential".into());
        cfg.session.model = "speech-model-2".into();
        cfg.session.voice = "Aoede".into();
        cfg.session.instruction_file = Some(PathBuf::from("/tmp/agent.txt"));
        cfg.audio.frame_samples = 2_048;
        cfg.audio.interrupt_policy = InterruptPolicy::ResetToDeviceClock;
        cfg.transport.endpoint = "wss://example.test/live".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.api_key.as_deref(), Some("test-credential"));
        assert_eq!(loaded.session.model, "speech-model-2");
        assert_eq!(loaded.session.voice, "Aoede");
        assert_eq!(
            loaded.session.instruction_file,
            Some(PathBuf::from("/tmp/agent.txt"))
        );
        assert_eq!(loaded.audio.frame_samples, 2_048);
        assert_eq!(
            loaded.audio.interrupt_policy,
            InterruptPolicy::ResetToDeviceClock
        );
        assert_eq!(loaded.transport.endpoint, "wss://example.test/live");
    }
}

//! Read-aloud channel for assistant messages.
//!
//! Only one utterance may play at a time, so the channel owns the output
//! device exclusively and every `speak` stops whatever was playing first.
//! Cloud audio comes from `/api/tts`; any failure there falls back to the
//! device's own voices.

use base64::Engine as _;

use super::transport::CloudSpeech;
use crate::error::AppError;

/// Device voice locales in order of preference; any other `es*` voice comes next.
pub const PREFERRED_VOICE_LANGS: [&str; 4] = ["es-AR", "es-419", "es-MX", "es-US"];
pub const DEVICE_SPEECH_RATE: f32 = 0.85;
const DEVICE_DEFAULT_LANG: &str = "es-AR";

/// An installed on-device voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceVoice {
    pub name: String,
    pub lang: String,
}

/// Parameters for on-device synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<DeviceVoice>,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// The audio output the channel drives.
pub trait SpeechOutput: Send {
    /// Play decoded MP3 audio.
    fn play_audio(&mut self, mp3: Vec<u8>) -> Result<(), AppError>;
    /// Speak with the device synthesizer.
    fn speak_local(&mut self, utterance: Utterance) -> Result<(), AppError>;
    /// Halt both cloud audio and device speech.
    fn stop(&mut self);
    fn voices(&self) -> Vec<DeviceVoice>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Cloud,
    Device,
    Stopped,
    Unavailable,
}

/// Pick the device voice: preferred locales first, then any Spanish voice.
pub fn select_device_voice(voices: &[DeviceVoice]) -> Option<DeviceVoice> {
    PREFERRED_VOICE_LANGS
        .iter()
        .find_map(|lang| voices.iter().find(|v| v.lang == *lang))
        .or_else(|| voices.iter().find(|v| v.lang.starts_with("es")))
        .cloned()
}

fn device_utterance(text: &str, voices: &[DeviceVoice]) -> Utterance {
    let voice = select_device_voice(voices);
    let lang = voice
        .as_ref()
        .map(|v| v.lang.clone())
        .unwrap_or_else(|| DEVICE_DEFAULT_LANG.to_string());
    Utterance {
        text: text.to_string(),
        voice,
        lang,
        rate: DEVICE_SPEECH_RATE,
        pitch: 1.0,
        volume: 1.0,
    }
}

/// Exclusive handle over the speech output.
pub struct SpeechChannel<O: SpeechOutput> {
    output: O,
    speaking: Option<usize>,
}

impl<O: SpeechOutput> SpeechChannel<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            speaking: None,
        }
    }

    /// Index of the message currently being read, if any.
    pub fn speaking(&self) -> Option<usize> {
        self.speaking
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn stop(&mut self) {
        self.output.stop();
        self.speaking = None;
    }

    /// Play message `index`. Calling again for the message already playing stops it.
    pub async fn speak<S>(&mut self, source: &S, index: usize, text: &str) -> Playback
    where
        S: CloudSpeech + ?Sized,
    {
        let toggling_off = self.speaking == Some(index);
        self.stop();
        if toggling_off {
            return Playback::Stopped;
        }

        match self.play_cloud(source, text).await {
            Ok(()) => {
                self.speaking = Some(index);
                return Playback::Cloud;
            }
            Err(e) => tracing::warn!("Cloud speech failed, using device voice: {}", e),
        }

        let utterance = device_utterance(text, &self.output.voices());
        match self.output.speak_local(utterance) {
            Ok(()) => {
                self.speaking = Some(index);
                Playback::Device
            }
            Err(e) => {
                tracing::warn!("No speech output available: {}", e);
                Playback::Unavailable
            }
        }
    }

    async fn play_cloud<S>(&mut self, source: &S, text: &str) -> Result<(), AppError>
    where
        S: CloudSpeech + ?Sized,
    {
        let audio = source
            .fetch_audio(text)
            .await
            .map_err(|state| AppError::Internal(format!("speech request failed: {:?}", state.kind)))?;
        let mp3 = base64::engine::general_purpose::STANDARD
            .decode(audio.trim())
            .map_err(|e| AppError::Internal(format!("invalid audio payload: {e}")))?;
        self.output.play_audio(mp3)
    }

    /// Mark playback finished (the output reports the end of an utterance).
    pub fn finished(&mut self) {
        self.speaking = None;
    }
}

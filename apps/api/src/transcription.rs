//! Speech-to-text for recorded answers.
//!
//! The transcript is fed into answer submission like typed text. Only the
//! derived speech metrics are computed here.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::interview::models::AudioMetrics;

pub const MAX_RECORDING_SECONDS: f64 = 300.0;
pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

const TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Audio file is required")]
    EmptyAudio,

    #[error("Audio recording too long. Maximum 5 minutes allowed.")]
    TooLong,

    #[error("Audio file too large. Maximum 10MB allowed.")]
    TooLarge,

    #[error("transcription backend unavailable: {0}")]
    Unavailable(String),

    #[error("transcription backend rejected the audio (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes, content_type: &str)
        -> Result<String, TranscriptionError>;
}

/// Rejects recordings the transcriber should never see.
pub fn validate_recording(audio: &[u8], duration_seconds: f64) -> Result<(), TranscriptionError> {
    if audio.is_empty() {
        return Err(TranscriptionError::EmptyAudio);
    }
    if audio.len() > MAX_AUDIO_BYTES {
        return Err(TranscriptionError::TooLarge);
    }
    if duration_seconds > MAX_RECORDING_SECONDS {
        return Err(TranscriptionError::TooLong);
    }
    Ok(())
}

/// Word count and speaking rate of a transcript spoken over `duration_seconds`.
pub fn audio_metrics(transcript: &str, duration_seconds: f64) -> AudioMetrics {
    let duration = if duration_seconds.is_finite() {
        duration_seconds.max(0.0)
    } else {
        0.0
    };
    let word_count = transcript.split_whitespace().count() as u32;
    let words_per_minute = if duration > 0.0 {
        (f64::from(word_count) / duration * 60.0).round()
    } else {
        0.0
    };

    AudioMetrics {
        duration,
        words_per_minute,
        word_count,
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(alias = "transcription")]
    text: String,
}

/// Posts raw audio to a speech-to-text service answering `{"text": "..."}`.
#[derive(Clone)]
pub struct HttpTranscriber {
    client: Client,
    url: String,
}

impl HttpTranscriber {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(TRANSCRIPTION_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            url,
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        audio: Bytes,
        content_type: &str,
    ) -> Result<String, TranscriptionError> {
        let size = audio.len();
        let response = self
            .client
            .post(&self.url)
            .header("content-type", content_type)
            .body(audio)
            .send()
            .await
            .map_err(|e| TranscriptionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                TranscriptionError::Unavailable(format!("status {status}: {message}"))
            } else {
                TranscriptionError::Rejected {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Unavailable(format!("unreadable response body: {e}")))?;

        debug!("Transcribed {size} bytes of audio into {} chars", body.text.len());
        Ok(body.text.trim().to_string())
    }
}

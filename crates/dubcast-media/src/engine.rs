//! Clip-level media operations.
//!
//! The dubbing pipeline only talks to [`MediaEngine`]; [`FfmpegEngine`] is the
//! production implementation on top of the FFmpeg CLI.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_duration;
use crate::stretch::atempo_filter;

/// Media operations used by the dubbing pipeline.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Duration of a media file in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64>;

    /// Cut `[start, end]` out of `source`, keeping its original audio.
    async fn extract(&self, source: &Path, start: f64, end: f64, output: &Path)
        -> MediaResult<()>;

    /// Slow the video track by `ratio` (PTS multiplier); audio is dropped.
    async fn stretch_video(&self, input: &Path, ratio: f64, output: &Path) -> MediaResult<()>;

    /// Change audio speed by `tempo` without altering pitch.
    async fn stretch_audio(&self, input: &Path, tempo: f64, output: &Path) -> MediaResult<()>;

    /// Combine a video track with an audio track, padding audio with silence
    /// so the result lasts `duration` seconds.
    async fn mux(&self, video: &Path, audio: &Path, duration: f64, output: &Path)
        -> MediaResult<()>;

    /// Join `inputs` end to end in one pass.
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()>;
}

/// Output encoding shared by every re-encoding operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingSettings {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub sample_rate: u32,
    pub channels: u8,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 20,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            sample_rate: 44100,
            channels: 2,
        }
    }
}

/// [`MediaEngine`] backed by the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    runner: FfmpegRunner,
    encoding: EncodingSettings,
}

impl FfmpegEngine {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            encoding: EncodingSettings::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingSettings) -> Self {
        self.encoding = encoding;
        self
    }

    fn encode_video(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        cmd.video_codec(&self.encoding.video_codec)
            .preset(&self.encoding.preset)
            .crf(self.encoding.crf)
    }

    fn encode_audio(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        cmd.audio_codec(&self.encoding.audio_codec)
            .audio_bitrate(&self.encoding.audio_bitrate)
            .audio_format(self.encoding.sample_rate, self.encoding.channels)
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        probe_duration(path).await
    }

    async fn extract(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        output: &Path,
    ) -> MediaResult<()> {
        if end <= start {
            return Err(MediaError::invalid_argument(format!(
                "empty extraction range [{:.3}, {:.3}]",
                start, end
            )));
        }
        debug!(start, end, output = %output.display(), "Extracting clip");

        let cmd = FfmpegCommand::new(source, output)
            .seek(start)
            .duration(end - start);
        let cmd = self.encode_audio(self.encode_video(cmd));
        self.runner.run(&cmd).await
    }

    async fn stretch_video(&self, input: &Path, ratio: f64, output: &Path) -> MediaResult<()> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(MediaError::invalid_argument(format!(
                "invalid video stretch ratio {}",
                ratio
            )));
        }

        let cmd = FfmpegCommand::new(input, output).no_audio();
        let cmd = if (ratio - 1.0).abs() < 1e-6 {
            cmd.video_codec("copy")
        } else {
            self.encode_video(cmd.video_filter(format!("setpts={:.6}*PTS", ratio)))
        };
        self.runner.run(&cmd).await
    }

    async fn stretch_audio(&self, input: &Path, tempo: f64, output: &Path) -> MediaResult<()> {
        if !(tempo.is_finite() && tempo > 0.0) {
            return Err(MediaError::invalid_argument(format!(
                "invalid audio tempo {}",
                tempo
            )));
        }

        let cmd = FfmpegCommand::new(input, output)
            .no_video()
            .audio_filter(atempo_filter(tempo));
        let cmd = self.encode_audio(cmd);
        self.runner.run(&cmd).await
    }

    async fn mux(
        &self,
        video: &Path,
        audio: &Path,
        duration: f64,
        output: &Path,
    ) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(video, output)
            .add_input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("copy")
            .audio_filter("apad");
        let cmd = self
            .encode_audio(cmd)
            .output_duration(duration)
            .shortest();
        self.runner.run(&cmd).await
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()> {
        match inputs {
            [] => Err(MediaError::invalid_argument("nothing to concatenate")),
            [single] => {
                tokio::fs::copy(single, output).await?;
                Ok(())
            }
            _ => {
                let cmd = FfmpegCommand::with_inputs(inputs, output)
                    .filter_complex(concat_filter(inputs.len()))
                    .map("[v]")
                    .map("[a]")
                    .output_args(["-fps_mode", "vfr"]);
                let cmd = self.encode_audio(self.encode_video(cmd));
                self.runner.run(&cmd).await
            }
        }
    }
}

/// `[0:v:0][0:a:0][1:v:0][1:a:0]...concat=n=N:v=1:a=1[v][a]`
fn concat_filter(count: usize) -> String {
    let mut filter = String::new();
    for i in 0..count {
        filter.push_str(&format!("[{i}:v:0][{i}:a:0]"));
    }
    filter.push_str(&format!("concat=n={}:v=1:a=1[v][a]", count));
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_filter() {
        assert_eq!(
            concat_filter(2),
            "[0:v:0][0:a:0][1:v:0][1:a:0]concat=n=2:v=1:a=1[v][a]"
        );
    }

    #[tokio::test]
    async fn test_extract_rejects_empty_range() {
        let engine = FfmpegEngine::default();
        let err = engine
            .extract(Path::new("in.mp4"), 3.0, 3.0, Path::new("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_concat_single_input_copies() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.mp4");
        let output = dir.path().join("b.mp4");
        tokio::fs::write(&input, b"clip").await.unwrap();

        FfmpegEngine::default()
            .concat(&[input.clone()], &output)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"clip");
        assert!(input.exists());
    }
}

// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Frame-level container I/O over external FFmpeg.
//!
//! Two child processes bracket the per-frame loop: a decoder emitting
//! raw `bgr24` frames on stdout, and an encoder consuming raw `bgr24`
//! frames on stdin while muxing the original audio through. Both are
//! killed and reaped on drop, so every exit path — including panics in
//! worker code — releases the container handles.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use super::error::VideoError;

/// Output codec choice, resolved once per job from the input's codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCodec {
    /// H.264 via libx264: reused for h264/avc1 inputs.
    H264,
    /// MPEG-4 Part 2 with fourcc `mp4v`: reused for mpeg4/mp4v inputs,
    /// and the fallback for every codec outside the preferred set.
    Mp4v,
}

impl OutputCodec {
    /// Preference rule: an input whose codec is in the preferred
    /// H.264/MP4 set reuses that codec on output — h264/avc1 stay
    /// H.264, mpeg4/mp4v keep their fourcc. Anything else falls back
    /// to `mp4v`.
    pub fn select(input_codec: Option<&str>) -> Self {
        match input_codec.map(|name| name.to_ascii_lowercase()).as_deref() {
            Some("h264" | "avc1") => Self::H264,
            _ => Self::Mp4v,
        }
    }

    fn encoder_args(self) -> &'static [&'static str] {
        match self {
            // aq-mode=0 keeps the rate control from redistributing bits
            // away from the watermarked mid-frequencies.
            Self::H264 => &[
                "-c:v",
                "libx264",
                "-preset",
                "fast",
                "-crf",
                "18",
                "-pix_fmt",
                "yuv420p",
                "-x264-params",
                "aq-mode=0",
            ],
            Self::Mp4v => &["-c:v", "mpeg4", "-vtag", "mp4v", "-q:v", "3", "-pix_fmt", "yuv420p"],
        }
    }
}

/// Reads decoded `bgr24` frames from an FFmpeg child process.
pub struct FrameDecoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
    frame_len: usize,
}

impl FrameDecoder {
    /// Spawn the decoder for `input`. `frame_len` is `width * height * 3`.
    pub fn open(input: &Path, width: u32, height: u32) -> Result<Self, VideoError> {
        log::debug!(
            target: "vidmark::video::io",
            "opening decoder for {} ({}x{})",
            input.display(),
            width,
            height
        );

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(input)
            .args(["-f", "rawvideo", "-pix_fmt", "bgr24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::DecoderError(format!("could not spawn ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VideoError::DecoderError("decoder stdout unavailable".to_string()))?;

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            frame_len: width as usize * height as usize * 3,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Read exactly one frame into `buf`. Returns `Ok(false)` on clean
    /// end of stream; a short read mid-frame is a decoder error.
    pub fn next_frame(&mut self, buf: &mut [u8]) -> Result<bool, VideoError> {
        debug_assert_eq!(buf.len(), self.frame_len);
        let mut pos = 0;
        while pos < buf.len() {
            match self.stdout.read(&mut buf[pos..]) {
                Ok(0) if pos == 0 => return Ok(false),
                Ok(0) => {
                    return Err(VideoError::DecoderError(format!(
                        "truncated frame: got {pos} of {} bytes",
                        buf.len()
                    )))
                }
                Ok(n) => pos += n,
                Err(e) => return Err(VideoError::DecoderError(format!("read failed: {e}"))),
            }
        }
        Ok(true)
    }
}

impl Drop for FrameDecoder {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Writes raw `bgr24` frames into an FFmpeg child that encodes and
/// muxes the output file.
pub struct FrameEncoder {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    output: PathBuf,
    finished: bool,
}

impl FrameEncoder {
    /// Spawn the encoder writing to `output`. Audio from `audio_source`
    /// is mapped through when the stream exists.
    pub fn create(
        output: &Path,
        width: u32,
        height: u32,
        fps_rational: &str,
        audio_source: &Path,
        codec: OutputCodec,
    ) -> Result<Self, VideoError> {
        log::debug!(
            target: "vidmark::video::io",
            "opening encoder for {} ({codec:?})",
            output.display()
        );

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "bgr24"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", fps_rational])
            .args(["-i", "pipe:0"])
            .arg("-i")
            .arg(audio_source)
            .args(["-map", "0:v:0", "-map", "1:a?"])
            .args(codec.encoder_args())
            .args(["-c:a", "copy", "-shortest"])
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::EncoderError(format!("could not spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VideoError::EncoderError("encoder stdin unavailable".to_string()))?;

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            output: output.to_path_buf(),
            finished: false,
        })
    }

    pub fn write_frame(&mut self, buf: &[u8]) -> Result<(), VideoError> {
        self.stdin
            .as_mut()
            .expect("write after finish")
            .write_all(buf)
            .map_err(|e| VideoError::EncoderError(format!("frame write failed: {e}")))
    }

    /// Flush, close stdin, and wait for the encoder to finalize the
    /// container. Must be called on success paths; dropping instead
    /// aborts the encode.
    pub fn finish(mut self) -> Result<(), VideoError> {
        let mut stdin = self.stdin.take().expect("finish called twice");
        stdin
            .flush()
            .map_err(|e| VideoError::EncoderError(format!("flush failed: {e}")))?;
        drop(stdin);

        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| VideoError::EncoderError(format!("wait failed: {e}")))?;

        if status.success() {
            log::debug!(
                target: "vidmark::video::io",
                "encoder finished: {}",
                self.output.display()
            );
            Ok(())
        } else {
            Err(VideoError::EncoderError(format!("ffmpeg exited with {status}")))
        }
    }
}

impl Drop for FrameEncoder {
    fn drop(&mut self) {
        if !self.finished {
            // Abort path: drop the pipe, kill, reap. The pipeline
            // removes the partial output file afterwards.
            self.stdin.take();
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_preference_rule_reuses_input_codec() {
        // H.264-family inputs stay H.264.
        assert_eq!(OutputCodec::select(Some("h264")), OutputCodec::H264);
        assert_eq!(OutputCodec::select(Some("H264")), OutputCodec::H264);
        assert_eq!(OutputCodec::select(Some("avc1")), OutputCodec::H264);
        // MPEG-4 Part 2 inputs keep their fourcc, not h264.
        assert_eq!(OutputCodec::select(Some("mpeg4")), OutputCodec::Mp4v);
        assert_eq!(OutputCodec::select(Some("mp4v")), OutputCodec::Mp4v);
        // Outside the preferred set: fall back to mp4v.
        assert_eq!(OutputCodec::select(Some("vp9")), OutputCodec::Mp4v);
        assert_eq!(OutputCodec::select(Some("hevc")), OutputCodec::Mp4v);
        assert_eq!(OutputCodec::select(Some("wmv2")), OutputCodec::Mp4v);
        assert_eq!(OutputCodec::select(None), OutputCodec::Mp4v);
    }

    #[test]
    fn encoder_args_carry_codec_identity() {
        assert!(OutputCodec::H264.encoder_args().contains(&"libx264"));
        let mp4v = OutputCodec::Mp4v.encoder_args();
        assert!(mp4v.contains(&"mpeg4"));
        assert!(mp4v.contains(&"mp4v"));
    }
}

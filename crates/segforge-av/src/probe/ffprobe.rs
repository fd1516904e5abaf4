//! FFprobe-based media probing.
//!
//! Shells out to `ffprobe -v error -print_format json -show_format -show_streams`
//! and maps the JSON output into a [`MediaDescriptor`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use segforge_core::{check_duration, Error, MediaDescriptor, Result, TranscodeCause};

use crate::command::ToolCommand;

/// Run ffprobe against `input` and describe it.
///
/// Spawn errors and non-zero exits are reported as [`Error::Probe`]. Running
/// past `timeout` is `Error::Transcode` with [`TranscodeCause::Timeout`], the
/// same as any other engine call that overruns.
pub async fn probe_with_ffprobe(
    ffprobe: &Path,
    input: &Path,
    timeout: Duration,
) -> Result<MediaDescriptor> {
    let mut cmd = ToolCommand::new(ffprobe.to_path_buf());
    cmd.timeout(timeout);
    cmd.args([
        "-v", "error",
        "-print_format", "json",
        "-show_format",
        "-show_streams",
    ]);
    cmd.arg(input.to_string_lossy().as_ref());

    let output = cmd.execute().await.map_err(|e| match e {
        Error::Tool { message, .. } => {
            Error::Probe(format!("{}: {message}", input.display()))
        }
        Error::ToolTimeout { timeout, .. } => Error::transcode(
            TranscodeCause::Timeout,
            format!(
                "{}: ffprobe killed after {}s",
                input.display(),
                timeout.as_secs()
            ),
        ),
        other => other,
    })?;

    parse_ffprobe_json(input, &output.stdout)
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Map raw ffprobe JSON into a [`MediaDescriptor`].
///
/// Duration is taken from the first video stream, falling back to the
/// container duration. Missing, non-numeric, negative, non-finite or
/// absurdly long durations are rejected, as are inputs without a video stream.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaDescriptor> {
    let output: FfprobeOutput = serde_json::from_str(json).map_err(|e| {
        Error::Probe(format!("{}: ffprobe JSON parse error: {e}", path.display()))
    })?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| Error::Probe(format!("{}: no video stream found", path.display())))?;

    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let raw = video
        .duration
        .as_deref()
        .or(output.format.duration.as_deref())
        .ok_or_else(|| Error::Probe(format!("{}: no duration reported", path.display())))?;

    let duration_secs = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Probe(format!("{}: invalid duration '{raw}'", path.display())))?;
    let duration_secs = check_duration(path, duration_secs)?;

    Ok(MediaDescriptor {
        path: PathBuf::from(path),
        duration_secs,
        has_video: true,
        has_audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<MediaDescriptor> {
        parse_ffprobe_json(Path::new("/in/clip.mp4"), json)
    }

    #[test]
    fn video_stream_duration_preferred() {
        let d = parse(
            r#"{
                "format": {"duration": "30.500000"},
                "streams": [
                    {"codec_type": "video", "duration": "25.000000"},
                    {"codec_type": "audio", "duration": "30.500000"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(d.duration_secs, 25.0);
        assert!(d.has_video);
        assert!(d.has_audio);
        assert_eq!(d.path, PathBuf::from("/in/clip.mp4"));
    }

    #[test]
    fn falls_back_to_format_duration() {
        // Matroska streams usually carry no per-stream duration.
        let d = parse(
            r#"{
                "format": {"duration": "12.0"},
                "streams": [{"codec_type": "video"}]
            }"#,
        )
        .unwrap();
        assert_eq!(d.duration_secs, 12.0);
        assert!(!d.has_audio);
    }

    #[test]
    fn zero_duration_is_accepted() {
        let d = parse(r#"{"format": {"duration": "0"}, "streams": [{"codec_type": "video"}]}"#)
            .unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn no_video_stream_is_probe_error() {
        let err = parse(
            r#"{"format": {"duration": "5"}, "streams": [{"codec_type": "audio"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Probe(ref m) if m.contains("no video stream")));
    }

    #[test]
    fn missing_duration_is_probe_error() {
        let err = parse(r#"{"format": {}, "streams": [{"codec_type": "video"}]}"#).unwrap_err();
        assert!(matches!(err, Error::Probe(ref m) if m.contains("no duration")));
    }

    #[test]
    fn bad_durations_are_rejected() {
        for raw in ["N/A", "-1.0", "NaN", "inf"] {
            let json = format!(
                r#"{{"format": {{"duration": "{raw}"}}, "streams": [{{"codec_type": "video"}}]}}"#
            );
            let err = parse(&json).unwrap_err();
            assert!(matches!(err, Error::Probe(_)), "{raw} should be rejected");
        }
    }

    #[test]
    fn absurd_duration_is_probe_error() {
        let err = parse(r#"{"format": {"duration": "1e300"}, "streams": [{"codec_type": "video"}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Probe(ref m) if m.contains("exceeds")));

        let week = parse(r#"{"format": {"duration": "604800"}, "streams": [{"codec_type": "video"}]}"#)
            .unwrap();
        assert_eq!(week.duration_secs, 604_800.0);
    }

    #[test]
    fn garbage_json_is_probe_error() {
        assert!(matches!(parse("not json"), Err(Error::Probe(_))));
    }

    #[tokio::test]
    async fn missing_binary_maps_to_probe_error() {
        let err = probe_with_ffprobe(
            Path::new("/nonexistent/ffprobe_xyz"),
            Path::new("/in/clip.mp4"),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Probe(_)), "unexpected: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_ffprobe_is_a_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let ffprobe = dir.path().join("ffprobe");
        std::fs::write(&ffprobe, "#!/bin/sh\nsleep 10\n").unwrap();
        std::fs::set_permissions(&ffprobe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = probe_with_ffprobe(&ffprobe, Path::new("/in/clip.mp4"), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Transcode { cause: TranscodeCause::Timeout, .. }),
            "unexpected: {err}"
        );
    }
}

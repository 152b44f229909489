//! MP4Box argument synthesis.

use std::path::PathBuf;

use serde::Serialize;

use df_core::ResolvedEncode;

use super::encoder::EncoderCommand;

/// Segment duration used when the frame rate or GOP size is unknown.
pub const DEFAULT_KEY_INTERVAL_MS: f64 = 3000.0;

/// A fully rendered MP4Box invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MuxerCommand {
    pub args: Vec<String>,
    /// `{output_directory}/{output_basename}.mpd`
    pub manifest_path: PathBuf,
    /// Video then audio pieces consumed by the muxer.
    pub inputs: Vec<PathBuf>,
}

/// Segment duration in milliseconds for a GOP of `keyframe_interval` frames.
pub fn key_interval_ms(framerate: f64, keyframe_interval: u32) -> f64 {
    if framerate <= 0.0 || !framerate.is_finite() || keyframe_interval == 0 {
        return DEFAULT_KEY_INTERVAL_MS;
    }
    f64::from(keyframe_interval) / framerate * 1000.0
}

/// Build the muxer invocation from the encoder's video and audio pieces.
/// Subtitle pieces are not muxed; they are added to the manifest afterwards.
pub fn build_muxer_command(resolved: &ResolvedEncode, encoder: &EncoderCommand) -> MuxerCommand {
    let request = &resolved.request;
    let manifest_path = resolved.manifest_path();
    let interval = key_interval_ms(resolved.framerate, resolved.keyframe_interval)
        .round()
        .to_string();

    let mut args: Vec<String> = vec![
        "-dash".into(),
        interval.clone(),
        "-frag".into(),
        interval,
        "-rap".into(),
        "-frag-rap".into(),
        "-bs-switching".into(),
        "no".into(),
        "-profile".into(),
        request.muxer.profile.clone(),
    ];
    args.extend(request.muxer.additional_flags.iter().cloned());
    args.push("-out".into());
    args.push(manifest_path.to_string_lossy().into_owned());

    let inputs: Vec<PathBuf> = encoder
        .video_pieces
        .iter()
        .chain(&encoder.audio_pieces)
        .map(|p| p.path.clone())
        .collect();
    args.extend(inputs.iter().map(|p| p.to_string_lossy().into_owned()));

    MuxerCommand {
        args,
        manifest_path,
        inputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_encoder_command;
    use df_core::{DashRequest, MediaMetadata, MediaStream, Quality};

    fn fixture(framerate: Option<f64>, gop: Option<u32>) -> (ResolvedEncode, EncoderCommand) {
        let mut meta = MediaMetadata::new("/in/movie.mkv");
        meta.bitrate_kbps = 10_000;
        meta.framerate = 25.0;
        meta.video_streams.push(MediaStream::default());
        meta.audio_streams.push(MediaStream {
            language: Some("eng".into()),
            ..MediaStream::default()
        });
        meta.subtitle_streams.push(MediaStream::default());

        let mut request = DashRequest::new(
            "/in/movie.mkv",
            "/out",
            "movie",
            vec![Quality::new(1280, 720, 3000, "fast"), Quality::new(640, 360, 800, "fast")],
        )
        .with_working_directory("/work");
        request.framerate = framerate;
        request.keyframe_interval = gop;

        let resolved = ResolvedEncode::resolve(&request, &meta, |_, _| false);
        let encoder = build_encoder_command(&resolved, &meta);
        (resolved, encoder)
    }

    #[test]
    fn key_interval_defaults() {
        assert_eq!(key_interval_ms(0.0, 72), 3000.0);
        assert_eq!(key_interval_ms(24.0, 0), 3000.0);
        assert_eq!(key_interval_ms(f64::NAN, 72), 3000.0);
    }

    #[test]
    fn key_interval_is_exact() {
        assert_eq!(key_interval_ms(24.0, 48), 2000.0);
        assert_eq!(key_interval_ms(30.0, 45), 45.0 / 30.0 * 1000.0);
        let ntsc = 24000.0 / 1001.0;
        assert_eq!(key_interval_ms(ntsc, 72), 72.0 / ntsc * 1000.0);
    }

    #[test]
    fn argument_layout() {
        let (resolved, encoder) = fixture(Some(25.0), Some(50));
        let cmd = build_muxer_command(&resolved, &encoder);

        assert_eq!(
            cmd.args,
            vec![
                "-dash", "2000", "-frag", "2000", "-rap", "-frag-rap", "-bs-switching", "no",
                "-profile", "onDemand", "-out", "/out/movie.mpd",
                "/work/movie_video_3000k_0.mp4", "/work/movie_video_800k_1.mp4",
                "/work/movie_audio_eng_2.mp4",
            ]
        );
        assert_eq!(cmd.manifest_path, PathBuf::from("/out/movie.mpd"));
        assert_eq!(cmd.inputs.len(), 3);
    }

    #[test]
    fn unknown_framerate_uses_default_interval() {
        let (mut resolved, encoder) = fixture(Some(0.0), None);
        resolved.keyframe_interval = 0;
        let cmd = build_muxer_command(&resolved, &encoder);
        assert_eq!(&cmd.args[..2], &["-dash", "3000"]);
    }

    #[test]
    fn extra_flags_precede_out() {
        let (mut resolved, encoder) = fixture(None, None);
        resolved.request.muxer.additional_flags = vec!["-segment-name".into(), "seg_".into()];
        let cmd = build_muxer_command(&resolved, &encoder);
        let extra = cmd.args.iter().position(|a| a == "-segment-name").unwrap();
        let out = cmd.args.iter().position(|a| a == "-out").unwrap();
        assert_eq!(extra + 2, out);
        // 75 frames at 25 fps.
        assert_eq!(cmd.args[1], "3000");
    }
}

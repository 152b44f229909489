//! ffmpeg argument synthesis.

use std::path::Path;

use serde::Serialize;

use df_core::{MediaMetadata, Quality, ResolvedEncode, StreamKind};

use super::{decimal, StreamPiece};

/// A fully rendered ffmpeg invocation plus the files it will write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncoderCommand {
    pub args: Vec<String>,
    pub video_pieces: Vec<StreamPiece>,
    pub audio_pieces: Vec<StreamPiece>,
    pub subtitle_pieces: Vec<StreamPiece>,
}

impl EncoderCommand {
    /// Every piece in index order.
    pub fn pieces(&self) -> impl Iterator<Item = &StreamPiece> {
        self.video_pieces
            .iter()
            .chain(&self.audio_pieces)
            .chain(&self.subtitle_pieces)
    }

    /// Every path the encoder is expected to write.
    pub fn output_paths(&self) -> Vec<&Path> {
        self.pieces().map(|p| p.path.as_path()).collect()
    }

    /// Highest piece index, or `None` when there are no pieces.
    pub fn max_index(&self) -> Option<u32> {
        self.pieces().map(|p| p.index).max()
    }
}

/// Build the encoder invocation.
///
/// One output per ladder rung (all mapped from the first video stream), one
/// per input audio stream and one per input subtitle stream, in that order.
/// Piece indexes start at 0 and are shared across the three groups.
pub fn build_encoder_command(resolved: &ResolvedEncode, metadata: &MediaMetadata) -> EncoderCommand {
    let request = &resolved.request;
    let options = &request.encoder;
    let base = &request.output_basename;
    let work_dir = resolved.working_directory();

    let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];
    args.extend(options.additional_global_flags.iter().cloned());
    args.push("-i".into());
    args.push(request.input.to_string_lossy().into_owned());

    let mut next_index = 0u32;
    let mut take_index = || {
        let i = next_index;
        next_index += 1;
        i
    };

    let source_video = metadata.primary_video();
    let mut video_pieces = Vec::with_capacity(resolved.qualities.len());
    for (position, quality) in resolved.qualities.iter().enumerate() {
        let copy = position == 0 && resolved.copy_top_quality && quality.is_copy();
        let index = take_index();
        let path = work_dir.join(video_file_name(base, quality, index));

        args.extend(["-map".to_string(), "0:v:0".to_string()]);
        if copy {
            args.extend(["-c:v".to_string(), "copy".to_string()]);
        } else {
            push_video_encode(&mut args, resolved, quality);
        }
        args.push(path.to_string_lossy().into_owned());

        video_pieces.push(StreamPiece {
            index,
            kind: StreamKind::Video,
            language: source_video
                .map(|s| s.language_or_und().to_string())
                .unwrap_or_else(|| df_core::language::UNDETERMINED.to_string()),
            path,
            quality: Some(quality.clone()),
            stream: source_video.cloned(),
        });
    }

    let mut audio_pieces = Vec::with_capacity(metadata.audio_streams.len());
    for (n, stream) in metadata.audio_streams.iter().enumerate() {
        let index = take_index();
        let language = stream.language_or_und().to_string();
        let path = work_dir.join(format!("{base}_audio_{language}_{index}.mp4"));

        args.extend([
            "-map".to_string(),
            format!("0:a:{n}"),
            "-c:a".to_string(),
            options.audio_codec.clone(),
            "-b:a".to_string(),
            format!("{}k", options.audio_bitrate_kbps),
            "-ac".to_string(),
            options.audio_channels.to_string(),
            "-vn".to_string(),
        ]);
        args.extend(options.additional_audio_flags.iter().cloned());
        args.push(path.to_string_lossy().into_owned());

        audio_pieces.push(StreamPiece {
            index,
            kind: StreamKind::Audio,
            path,
            language,
            quality: None,
            stream: Some(stream.clone()),
        });
    }

    let mut subtitle_pieces = Vec::with_capacity(metadata.subtitle_streams.len());
    for (n, stream) in metadata.subtitle_streams.iter().enumerate() {
        let index = take_index();
        let language = stream.language_or_und().to_string();
        let path = work_dir.join(subtitle_file_name(base, &language, index));

        args.extend([
            "-map".to_string(),
            format!("0:s:{n}"),
            "-c:s".to_string(),
            "webvtt".to_string(),
        ]);
        args.extend(options.additional_subtitle_flags.iter().cloned());
        args.extend(["-f".to_string(), "webvtt".to_string()]);
        args.push(path.to_string_lossy().into_owned());

        subtitle_pieces.push(StreamPiece {
            index,
            kind: StreamKind::Subtitle,
            path,
            language,
            quality: None,
            stream: Some(stream.clone()),
        });
    }

    EncoderCommand {
        args,
        video_pieces,
        audio_pieces,
        subtitle_pieces,
    }
}

/// `{base}_subtitle_{lang}_{index}.vtt`
pub fn subtitle_file_name(base: &str, language: &str, index: u32) -> String {
    format!("{base}_subtitle_{language}_{index}.vtt")
}

/// `{base}_video_{k}k_{index}.mp4`, or `{base}_video_copy_{index}.mp4`.
/// The index keeps rungs with equal bitrates apart.
fn video_file_name(base: &str, quality: &Quality, index: u32) -> String {
    if quality.is_copy() {
        format!("{base}_video_copy_{index}.mp4")
    } else {
        format!("{base}_video_{}k_{index}.mp4", quality.bitrate_kbps)
    }
}

fn push_video_encode(args: &mut Vec<String>, resolved: &ResolvedEncode, quality: &Quality) {
    let options = &resolved.request.encoder;

    args.extend([
        "-c:v".to_string(),
        options.video_codec.clone(),
        "-preset".to_string(),
        quality.preset.clone(),
    ]);

    // A copy rung that could not be copied keeps the source size and rate.
    if !quality.is_copy() {
        let k = quality.bitrate_kbps;
        args.extend([
            "-b:v".to_string(),
            format!("{k}k"),
            "-maxrate".to_string(),
            format!("{k}k"),
            "-bufsize".to_string(),
            format!("{}k", k * 2),
        ]);
        if quality.has_resolution() {
            args.extend([
                "-s".to_string(),
                format!("{}x{}", quality.width, quality.height),
            ]);
        }
    }

    if resolved.framerate > 0.0 {
        args.extend(["-r".to_string(), decimal(resolved.framerate)]);
    }
    if resolved.keyframe_interval > 0 {
        let gop = resolved.keyframe_interval.to_string();
        args.extend([
            "-g".to_string(),
            gop.clone(),
            "-keyint_min".to_string(),
            gop,
            "-sc_threshold".to_string(),
            "0".to_string(),
        ]);
    }

    if let Some(pix_fmt) = &quality.pixel_format {
        args.extend(["-pix_fmt".to_string(), pix_fmt.clone()]);
    }
    if let Some(profile) = &quality.profile {
        args.extend(["-profile:v".to_string(), profile.clone()]);
    }
    if let Some(level) = &quality.level {
        args.extend(["-level".to_string(), level.clone()]);
    }

    args.extend(options.additional_video_flags.iter().cloned());
}

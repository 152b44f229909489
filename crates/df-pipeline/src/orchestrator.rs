//! The encode orchestrator.
//!
//! [`DashEncoder::encode`] drives one input through
//! probe → resolve → encode → mux → harvest subtitles → post-process manifest.
//! Each stage checks the cancellation token on entry. Any failure deletes the
//! files the run has produced so far (best effort, failures only logged) and
//! surfaces as a single typed [`Error`].

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use df_av::{
    build_encoder_command, build_muxer_command, EncoderCommand, FfprobeProber, MuxerCommand,
    Prober, ToolCommand, ToolRegistry, FFMPEG, MP4BOX,
};
use df_core::{DashRequest, Error, MediaMetadata, ResolvedEncode, Result};
use df_mpd::{with_subtitles, Mpd, SubtitleEntry};

use crate::context::EncodeContext;
use crate::copy::{CopyEligibility, NeverCopy};
use crate::progress::ProgressShim;
use crate::subtitles::{harvest_subtitles, HarvestedSubtitle};

/// Stages of one encode run, in order. `Failed` is reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    Probed,
    QualitiesResolved,
    Encoding,
    Encoded,
    Muxing,
    Muxed,
    SubtitlesHarvested,
    ManifestPostProcessed,
    Done,
    Failed,
}

impl fmt::Display for EncodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodeStage::Probed => "probed",
            EncodeStage::QualitiesResolved => "qualities_resolved",
            EncodeStage::Encoding => "encoding",
            EncodeStage::Encoded => "encoded",
            EncodeStage::Muxing => "muxing",
            EncodeStage::Muxed => "muxed",
            EncodeStage::SubtitlesHarvested => "subtitles_harvested",
            EncodeStage::ManifestPostProcessed => "manifest_post_processed",
            EncodeStage::Done => "done",
            EncodeStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct DashEncodeResult {
    /// `{output_directory}/{output_basename}.mpd`
    pub manifest_path: PathBuf,
    /// The manifest as written to disk.
    pub manifest: Mpd,
    /// The encoder invocation with its pieces.
    pub encoder_command: EncoderCommand,
    /// The encoder command line as it was run.
    pub encoder_command_line: String,
    /// The muxer command line as it was run.
    pub muxer_command_line: String,
    /// Subtitle files referenced by the manifest.
    pub subtitles: Vec<HarvestedSubtitle>,
    /// The resolved encode the run used.
    pub resolved: ResolvedEncode,
}

/// Runs DASH encodes with a fixed set of tools.
pub struct DashEncoder {
    ffmpeg: PathBuf,
    mp4box: PathBuf,
    prober: Arc<dyn Prober>,
    copy_eligibility: Arc<dyn CopyEligibility>,
}

impl DashEncoder {
    /// Create an encoder. Stream copying is never used until a
    /// [`CopyEligibility`] is attached.
    pub fn new(ffmpeg: impl Into<PathBuf>, mp4box: impl Into<PathBuf>, prober: Arc<dyn Prober>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            mp4box: mp4box.into(),
            prober,
            copy_eligibility: Arc::new(NeverCopy),
        }
    }

    /// Create an encoder from discovered tools, probing with ffprobe.
    pub fn from_registry(tools: &ToolRegistry) -> Result<Self> {
        let ffmpeg = tools.path(FFMPEG)?.to_path_buf();
        let mp4box = tools.path(MP4BOX)?.to_path_buf();
        let prober = FfprobeProber::from_registry(tools)?;
        Ok(Self::new(ffmpeg, mp4box, Arc::new(prober)))
    }

    /// Builder: attach the stream-copy predicate.
    pub fn with_copy_eligibility(mut self, check: Arc<dyn CopyEligibility>) -> Self {
        self.copy_eligibility = check;
        self
    }

    /// Run one encode.
    pub async fn encode(&self, request: &DashRequest, ctx: &EncodeContext) -> Result<DashEncodeResult> {
        tracing::info!(
            input = %request.input.display(),
            output = %request.manifest_path().display(),
            "starting DASH encode"
        );
        match self.run(request, ctx).await {
            Ok(result) => {
                enter(EncodeStage::Done);
                Ok(result)
            }
            Err(e) if e.is_cancelled() => {
                tracing::info!(stage = %EncodeStage::Failed, "encode cancelled");
                Err(e)
            }
            Err(e) => {
                tracing::error!(stage = %EncodeStage::Failed, "encode failed: {e}");
                Err(e)
            }
        }
    }

    async fn run(&self, request: &DashRequest, ctx: &EncodeContext) -> Result<DashEncodeResult> {
        check_request(request)?;

        ctx.check_cancelled()?;
        let metadata = self.probe(&request.input).await?;
        enter(EncodeStage::Probed);

        ctx.check_cancelled()?;
        let resolved = ResolvedEncode::resolve(request, &metadata, |hints, meta| {
            self.copy_eligibility.is_copy_compatible(hints, meta)
        });
        tracing::info!(
            stage = %EncodeStage::QualitiesResolved,
            qualities = %render_ladder(&resolved),
            framerate = resolved.framerate,
            keyframe_interval = resolved.keyframe_interval,
            copy_top_quality = resolved.copy_top_quality,
            "encode stage"
        );

        ctx.check_cancelled()?;
        let encoder = build_encoder_command(&resolved, &metadata);
        let encoder_line = tool_command(&self.ffmpeg, &encoder.args).rendered();
        enter(EncodeStage::Encoding);
        self.run_encoder(&encoder, &encoder_line, &metadata, ctx).await?;
        enter(EncodeStage::Encoded);

        if ctx.cancellation.is_cancelled() {
            remove_all(encoder.output_paths()).await;
            return Err(Error::Cancelled);
        }
        let muxer = build_muxer_command(&resolved, &encoder);
        let muxer_line = tool_command(&self.mp4box, &muxer.args).rendered();
        enter(EncodeStage::Muxing);
        self.run_muxer(&resolved, &encoder, &encoder_line, &muxer, &muxer_line, ctx)
            .await?;
        enter(EncodeStage::Muxed);

        let manifest_path = muxer.manifest_path.clone();
        let outcome = async {
            ctx.check_cancelled()?;
            let subtitles = harvest_subtitles(&resolved, &encoder).await?;
            enter(EncodeStage::SubtitlesHarvested);

            ctx.check_cancelled()?;
            let manifest = post_process(&manifest_path, &subtitles)?;
            enter(EncodeStage::ManifestPostProcessed);
            Ok::<_, Error>((subtitles, manifest))
        }
        .await;

        let (subtitles, manifest) = match outcome {
            Ok(done) => done,
            Err(e) => {
                discard_manifest(&manifest_path, &request.input).await;
                remove_all(encoder.subtitle_pieces.iter().map(|p| p.path.as_path())).await;
                if e.is_cancelled() {
                    return Err(e);
                }
                return Err(Error::muxer_failed(
                    format!("manifest post-processing failed: {e}"),
                    "",
                    Some(encoder_line),
                    Some(muxer_line),
                ));
            }
        };

        Ok(DashEncodeResult {
            manifest_path,
            manifest,
            encoder_command: encoder,
            encoder_command_line: encoder_line,
            muxer_command_line: muxer_line,
            subtitles,
            resolved,
        })
    }

    async fn probe(&self, input: &Path) -> Result<MediaMetadata> {
        let metadata = self.prober.probe(input).await?.ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{} returned no metadata for {}",
                self.prober.name(),
                input.display()
            ))
        })?;
        if metadata.video_streams.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "no video stream in {}",
                input.display()
            )));
        }
        tracing::debug!(
            video = metadata.video_streams.len(),
            audio = metadata.audio_streams.len(),
            subtitles = metadata.subtitle_streams.len(),
            bitrate_kbps = metadata.bitrate_kbps,
            framerate = metadata.framerate,
            "input probed"
        );
        Ok(metadata)
    }

    async fn run_encoder(
        &self,
        encoder: &EncoderCommand,
        command_line: &str,
        metadata: &MediaMetadata,
        ctx: &EncodeContext,
    ) -> Result<()> {
        let shim = ProgressShim::new(metadata.duration_secs, ctx.progress.clone(), ctx.log.clone())?;
        let execution = tool_command(&self.ffmpeg, &encoder.args)
            .execute_streaming(
                |line| shim.stdout_line(line),
                |line| shim.stderr_line(Some(line)),
                &ctx.cancellation,
            )
            .await;

        match execution {
            Ok(output) if output.success() => {
                ctx.progress.send(1.0);
                Ok(())
            }
            Ok(output) => {
                remove_all(encoder.output_paths()).await;
                Err(Error::encoder_failed(
                    format!("exit code {}", output.exit_code),
                    output.combined_log(),
                    command_line,
                ))
            }
            Err(e) => {
                remove_all(encoder.output_paths()).await;
                if e.is_cancelled() {
                    return Err(e);
                }
                Err(Error::encoder_failed(e.to_string(), "", command_line))
            }
        }
    }

    async fn run_muxer(
        &self,
        resolved: &ResolvedEncode,
        encoder: &EncoderCommand,
        encoder_line: &str,
        muxer: &MuxerCommand,
        muxer_line: &str,
        ctx: &EncodeContext,
    ) -> Result<()> {
        let log = ctx.log.clone();
        let err_log = ctx.log.clone();
        let execution = tool_command(&self.mp4box, &muxer.args)
            .execute_streaming(
                move |line| log.stdout_line(line),
                move |line| err_log.stderr_line(line),
                &ctx.cancellation,
            )
            .await;

        // Video and audio pieces are intermediates whatever the outcome.
        remove_all(muxer.inputs.iter().map(PathBuf::as_path)).await;

        let failure = match execution {
            Ok(output) if output.success() && muxer.manifest_path.is_file() => return Ok(()),
            Ok(output) if output.success() => Error::ManifestNotCreated {
                path: muxer.manifest_path.clone(),
                log: output.combined_log(),
            },
            Ok(output) => Error::muxer_failed(
                format!("exit code {}", output.exit_code),
                output.combined_log(),
                Some(encoder_line.to_string()),
                Some(muxer_line.to_string()),
            ),
            Err(e) if e.is_cancelled() => e,
            Err(e) => Error::muxer_failed(
                e.to_string(),
                "",
                Some(encoder_line.to_string()),
                Some(muxer_line.to_string()),
            ),
        };

        let stdout: Vec<String> = match &failure {
            Error::MuxerFailed { log, .. } | Error::ManifestNotCreated { log, .. } => {
                log.lines().map(str::to_string).collect()
            }
            _ => Vec::new(),
        };
        discard_manifest(&muxer.manifest_path, &resolved.request.input).await;
        remove_listed(&stdout, &resolved.request.output_directory, &resolved.request.input).await;
        remove_all(encoder.subtitle_pieces.iter().map(|p| p.path.as_path())).await;
        Err(failure)
    }
}

impl fmt::Debug for DashEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashEncoder")
            .field("ffmpeg", &self.ffmpeg)
            .field("mp4box", &self.mp4box)
            .field("prober", &self.prober.name())
            .finish_non_exhaustive()
    }
}

fn tool_command(program: &Path, args: &[String]) -> ToolCommand {
    let mut cmd = ToolCommand::new(program.to_path_buf());
    cmd.args(args.iter().cloned());
    cmd
}

fn enter(stage: EncodeStage) {
    tracing::info!(stage = %stage, "encode stage");
}

fn render_ladder(resolved: &ResolvedEncode) -> String {
    resolved
        .qualities
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate the request and check that every directory it names exists.
fn check_request(request: &DashRequest) -> Result<()> {
    request.validate()?;
    for dir in [request.output_directory.as_path(), request.working_directory()] {
        if !dir.is_dir() {
            return Err(Error::invalid_working_directory(dir));
        }
    }
    if !request.input.is_file() {
        return Err(Error::InvalidArgument(format!(
            "input file not found: {}",
            request.input.display()
        )));
    }
    Ok(())
}

/// Load the manifest, append subtitle adaptation sets and rewrite it.
fn post_process(manifest_path: &Path, subtitles: &[HarvestedSubtitle]) -> Result<Mpd> {
    let loaded = Mpd::load(manifest_path)?;
    let entries: Vec<SubtitleEntry> = subtitles
        .iter()
        .map(|s| SubtitleEntry::new(s.language.clone(), s.file_name()))
        .collect();
    let manifest = with_subtitles(&loaded, &entries);
    manifest.save(manifest_path)?;
    Ok(manifest)
}

/// Delete a partially written manifest and every file it references inside
/// the manifest's directory.
async fn discard_manifest(manifest_path: &Path, input: &Path) {
    if !manifest_path.exists() {
        return;
    }
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    match Mpd::load(manifest_path) {
        Ok(mpd) => {
            let referenced: Vec<PathBuf> = mpd
                .referenced_files()
                .iter()
                .filter_map(|f| contained_path(base_dir, f, input))
                .collect();
            remove_all(referenced.iter().map(PathBuf::as_path)).await;
        }
        Err(e) => {
            tracing::warn!(path = %manifest_path.display(), "partial manifest unreadable: {e}");
        }
    }
    remove_quietly(manifest_path).await;
}

/// Delete files named on the muxer's output lines, restricted to the output
/// directory.
async fn remove_listed(lines: &[String], output_directory: &Path, input: &Path) {
    for line in lines {
        if let Some(candidate) = contained_path(output_directory, line, input) {
            if candidate.is_file() {
                remove_quietly(&candidate).await;
            }
        }
    }
}

/// `dir/name` when the result stays inside `dir` and is not the input.
/// Names with `..` components and absolute paths elsewhere are refused.
fn contained_path(dir: &Path, name: &str, input: &Path) -> Option<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let path = Path::new(name);
    if path.components().any(|c| c == Component::ParentDir) {
        return None;
    }
    let candidate = dir.join(path);
    (candidate.starts_with(dir) && candidate != input).then_some(candidate)
}

async fn remove_all<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        remove_quietly(path).await;
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "cleanup failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use df_core::Quality;

    #[test]
    fn stage_names() {
        assert_eq!(EncodeStage::QualitiesResolved.to_string(), "qualities_resolved");
        assert_eq!(EncodeStage::Failed.to_string(), "failed");
    }

    #[test]
    fn missing_output_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mkv");
        std::fs::write(&input, b"").unwrap();
        let request = DashRequest::new(
            &input,
            dir.path().join("missing"),
            "movie",
            vec![Quality::new(1280, 720, 3000, "fast")],
        );
        assert_matches!(check_request(&request), Err(Error::InvalidWorkingDirectory { path }) if path.ends_with("missing"));
    }

    #[test]
    fn missing_working_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mkv");
        std::fs::write(&input, b"").unwrap();
        let request = DashRequest::new(
            &input,
            dir.path(),
            "movie",
            vec![Quality::new(1280, 720, 3000, "fast")],
        )
        .with_working_directory(dir.path().join("scratch"));
        assert_matches!(check_request(&request), Err(Error::InvalidWorkingDirectory { .. }));
    }

    #[test]
    fn missing_input_is_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        let request = DashRequest::new(
            dir.path().join("absent.mkv"),
            dir.path(),
            "movie",
            vec![Quality::new(1280, 720, 3000, "fast")],
        );
        assert_matches!(check_request(&request), Err(Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn listed_files_outside_output_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let inside = out.join("movie_dashinit.mp4");
        let outside = dir.path().join("keep.mp4");
        std::fs::write(&inside, b"").unwrap();
        std::fs::write(&outside, b"").unwrap();

        let lines = vec![
            "movie_dashinit.mp4".to_string(),
            outside.to_string_lossy().into_owned(),
            "[DASH] Generating segments".to_string(),
        ];
        remove_listed(&lines, &out, Path::new("/in/movie.mkv")).await;
        assert!(!inside.exists());
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn discarded_manifest_only_removes_contained_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let segment = out.join("movie_video_3000k_0_dashinit.mp4");
        let sibling = dir.path().join("keep.mp4");
        let absolute = dir.path().join("abs.mp4");
        let input = out.join("movie.mkv");
        for path in [&segment, &sibling, &absolute, &input] {
            std::fs::write(path, b"").unwrap();
        }

        let manifest = out.join("movie.mpd");
        std::fs::write(
            &manifest,
            format!(
                r#"<MPD><Period><AdaptationSet>
                <Representation id="1"><BaseURL>movie_video_3000k_0_dashinit.mp4</BaseURL></Representation>
                <Representation id="2"><BaseURL>../keep.mp4</BaseURL></Representation>
                <Representation id="3"><BaseURL>{}</BaseURL></Representation>
                <Representation id="4"><BaseURL>movie.mkv</BaseURL></Representation>
                </AdaptationSet></Period></MPD>"#,
                absolute.display()
            ),
        )
        .unwrap();

        discard_manifest(&manifest, &input).await;

        assert!(!manifest.exists());
        assert!(!segment.exists());
        assert!(sibling.exists());
        assert!(absolute.exists());
        assert!(input.exists());
    }

    #[test]
    fn contained_paths() {
        let input = Path::new("/out/movie.mkv");
        let dir = Path::new("/out");
        assert_eq!(
            contained_path(dir, " seg.mp4 ", input),
            Some(PathBuf::from("/out/seg.mp4"))
        );
        assert_eq!(
            contained_path(dir, "/out/sub/seg.mp4", input),
            Some(PathBuf::from("/out/sub/seg.mp4"))
        );
        assert_eq!(contained_path(dir, "../seg.mp4", input), None);
        assert_eq!(contained_path(dir, "sub/../../seg.mp4", input), None);
        assert_eq!(contained_path(dir, "/etc/passwd", input), None);
        assert_eq!(contained_path(dir, "movie.mkv", input), None);
        assert_eq!(contained_path(dir, "", input), None);
    }
}

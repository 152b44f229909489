//! The manifest document.
//!
//! [`Mpd`] keeps the whole tree MP4Box wrote and offers typed queries over
//! the parts the pipeline cares about: periods, adaptation sets,
//! representations and the files they reference.

use std::io::Write;
use std::path::Path;

use df_core::{Error, Result};

use crate::xml::{Document, Element};

pub const MPD: &str = "MPD";
pub const PERIOD: &str = "Period";
pub const ADAPTATION_SET: &str = "AdaptationSet";
pub const REPRESENTATION: &str = "Representation";
pub const PROGRAM_INFORMATION: &str = "ProgramInformation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mpd {
    document: Document,
}

impl Default for Mpd {
    fn default() -> Self {
        Self::new(Element::new(MPD))
    }
}

impl Mpd {
    /// Wrap an `MPD` root element.
    pub fn new(root: Element) -> Self {
        Self {
            document: Document {
                prolog: Vec::new(),
                root,
            },
        }
    }

    /// Parse a manifest document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml)?;
        if document.root.local_name() != MPD {
            return Err(Error::Manifest(format!(
                "invalid manifest: root element is <{}>",
                document.root.name
            )));
        }
        Ok(Self { document })
    }

    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml(&xml)
    }

    /// Serialize to a complete document, XML declaration included.
    pub fn to_xml(&self) -> Result<String> {
        self.document.to_xml()
    }

    /// Write the manifest to `path`.
    ///
    /// The document is fully serialized first and then written to a temporary
    /// file in the same directory, which replaces `path` in one rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let xml = self.to_xml()?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(xml.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::from(e.error))?;

        tracing::debug!(path = %path.display(), bytes = xml.len(), "manifest written");
        Ok(())
    }

    pub fn root(&self) -> &Element {
        &self.document.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Element {
        &mut self.document.root
    }

    pub fn has_program_information(&self) -> bool {
        self.root().child(PROGRAM_INFORMATION).is_some()
    }

    pub fn periods(&self) -> impl Iterator<Item = &Element> {
        self.root().children_named(PERIOD)
    }

    /// Adaptation sets of every period, in document order.
    pub fn adaptation_sets(&self) -> impl Iterator<Item = &Element> {
        self.periods().flat_map(|p| p.children_named(ADAPTATION_SET))
    }

    /// Every representation, in document order.
    pub fn representations(&self) -> impl Iterator<Item = &Element> {
        self.adaptation_sets()
            .flat_map(|a| a.children_named(REPRESENTATION))
    }

    /// Every representation ID, in document order. Representations without
    /// an `id` are skipped.
    pub fn representation_ids(&self) -> Vec<&str> {
        self.representations().filter_map(|r| r.attr("id")).collect()
    }

    /// Largest numeric representation ID. Non-numeric IDs are ignored.
    pub fn max_representation_id(&self) -> Option<u64> {
        self.representation_ids()
            .into_iter()
            .filter_map(|id| id.trim().parse::<u64>().ok())
            .max()
    }

    /// File names referenced by the manifest, relative to its directory:
    /// representation `BaseURL`s, `Initialization@sourceURL` and
    /// `SegmentURL@media`. Segment templates are not expanded.
    pub fn referenced_files(&self) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        let mut push = |value: &str| {
            let value = value.trim();
            if !value.is_empty() && !files.iter().any(|f| f == value) {
                files.push(value.to_string());
            }
        };

        for rep in self.representations() {
            for element in rep.descendants() {
                let value = match element.local_name() {
                    "BaseURL" => Some(element.text()),
                    "Initialization" => element.attr("sourceURL").map(str::to_string),
                    "SegmentURL" => element.attr("media").map(str::to_string),
                    _ => None,
                };
                if let Some(value) = value {
                    push(value.as_str());
                }
            }
        }
        files
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;

    pub(crate) const GPAC_MPD: &str = r#"<?xml version="1.0"?>
<!-- MPD file Generated with GPAC version 2.2.1 -->
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" minBufferTime="PT1.500S" type="static" mediaPresentationDuration="PT0H1M0.000S" maxSegmentDuration="PT0H0M2.000S" profiles="urn:mpeg:dash:profile:isoff-on-demand:2011">
 <ProgramInformation moreInformationURL="https://gpac.io">
  <Title>movie.mpd generated by GPAC</Title>
 </ProgramInformation>

 <Period duration="PT0H1M0.000S">
  <AdaptationSet segmentAlignment="true" maxWidth="1280" maxHeight="720" maxFrameRate="25" par="16:9" lang="und" startWithSAP="1">
   <Representation id="1" mimeType="video/mp4" codecs="avc1.64001F" width="1280" height="720" frameRate="25" sar="1:1" bandwidth="4000000">
    <BaseURL>movie_video_4000k_1_dashinit.mp4</BaseURL>
    <SegmentBase indexRangeExact="true" indexRange="905-1084">
      <Initialization range="0-904"/>
    </SegmentBase>
   </Representation>
   <Representation id="2" mimeType="video/mp4" codecs="avc1.64001E" width="854" height="480" frameRate="25" sar="1:1" bandwidth="2000000">
    <BaseURL>movie_video_2000k_2_dashinit.mp4</BaseURL>
    <SegmentBase indexRangeExact="true" indexRange="905-1084">
      <Initialization range="0-904"/>
    </SegmentBase>
   </Representation>
  </AdaptationSet>
  <AdaptationSet segmentAlignment="true" lang="eng" startWithSAP="1">
   <AudioChannelConfiguration schemeIdUri="urn:mpeg:dash:23003:3:audio_channel_configuration:2011" value="2"/>
   <Representation id="3" mimeType="audio/mp4" codecs="mp4a.40.2" audioSamplingRate="48000" bandwidth="128000">
    <BaseURL>movie_audio_eng_3_dashinit.mp4</BaseURL>
    <SegmentBase indexRangeExact="true" indexRange="832-1011">
      <Initialization range="0-831"/>
    </SegmentBase>
   </Representation>
  </AdaptationSet>
 </Period>
</MPD>
"#;

    /// Live-profile output: segment addressing lives in `SegmentTemplate`.
    pub(crate) const LIVE_MPD: &str = r#"<?xml version="1.0"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" profiles="urn:mpeg:dash:profile:isoff-live:2011">
 <Period duration="PT0H0M10.000S">
  <AdaptationSet segmentAlignment="true" startWithSAP="1">
   <SegmentTemplate media="movie_$RepresentationID$_$Number$.m4s" initialization="movie_$RepresentationID$_.mp4" timescale="25" startNumber="1" duration="50"/>
   <Representation id="1" mimeType="video/mp4" codecs="avc1.64001F" width="1280" height="720" bandwidth="3000000"/>
  </AdaptationSet>
 </Period>
</MPD>
"#;

    #[test]
    fn parses_gpac_output() {
        let mpd = Mpd::from_xml(GPAC_MPD).unwrap();

        assert_eq!(mpd.root().attr("type"), Some("static"));
        assert!(mpd.has_program_information());
        assert_eq!(mpd.periods().count(), 1);

        let sets: Vec<&Element> = mpd.adaptation_sets().collect();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].children_named(REPRESENTATION).count(), 2);
        let first = mpd.representations().next().unwrap();
        assert_eq!(first.attr("width"), Some("1280"));
        assert_eq!(first.attr("bandwidth"), Some("4000000"));
        assert_eq!(
            sets[1].child("AudioChannelConfiguration").and_then(|c| c.attr("value")),
            Some("2")
        );
    }

    #[test]
    fn ids_and_files() {
        let mpd = Mpd::from_xml(GPAC_MPD).unwrap();
        assert_eq!(mpd.representation_ids(), vec!["1", "2", "3"]);
        assert_eq!(mpd.max_representation_id(), Some(3));
        assert_eq!(
            mpd.referenced_files(),
            vec![
                "movie_video_4000k_1_dashinit.mp4",
                "movie_video_2000k_2_dashinit.mp4",
                "movie_audio_eng_3_dashinit.mp4",
            ]
        );
    }

    #[test]
    fn segment_list_files_are_referenced() {
        let xml = r#"<MPD><Period><AdaptationSet><Representation id="1">
            <SegmentList><Initialization sourceURL="init.mp4"/><SegmentURL media="seg1.m4s"/><SegmentURL media="seg2.m4s"/></SegmentList>
            </Representation></AdaptationSet></Period></MPD>"#;
        let mpd = Mpd::from_xml(xml).unwrap();
        assert_eq!(mpd.referenced_files(), vec!["init.mp4", "seg1.m4s", "seg2.m4s"]);
    }

    #[test]
    fn non_numeric_ids_are_ignored_for_max() {
        let xml = GPAC_MPD.replace(r#"id="1""#, r#"id="video-hd""#);
        let mpd = Mpd::from_xml(&xml).unwrap();
        assert_eq!(mpd.max_representation_id(), Some(3));

        assert_eq!(Mpd::default().max_representation_id(), None);
    }

    #[test]
    fn serialization_reparses_to_same_tree() {
        let mpd = Mpd::from_xml(GPAC_MPD).unwrap();
        let xml = mpd.to_xml().unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(xml.contains("<!-- MPD file Generated with GPAC version 2.2.1 -->"));
        assert!(xml.contains("<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\""));
        assert!(xml.contains("\n      <Initialization range=\"0-904\"/>"));

        assert_eq!(Mpd::from_xml(&xml).unwrap(), mpd);
    }

    #[test]
    fn live_profile_survives_rewrite() {
        let mpd = Mpd::from_xml(LIVE_MPD).unwrap();
        let xml = mpd.to_xml().unwrap();
        assert!(xml.contains(
            r#"<SegmentTemplate media="movie_$RepresentationID$_$Number$.m4s" initialization="movie_$RepresentationID$_.mp4" timescale="25" startNumber="1" duration="50"/>"#
        ));
        assert!(mpd.referenced_files().is_empty());
    }

    #[test]
    fn garbage_is_manifest_error() {
        assert_matches!(Mpd::from_xml("<MPD><Period>"), Err(Error::Manifest(_)));
        assert_matches!(Mpd::from_xml("<html/>"), Err(Error::Manifest(_)));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert_matches!(
            Mpd::load(Path::new("/nonexistent/movie.mpd")),
            Err(Error::Io { .. })
        );
    }

    #[test]
    fn save_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.mpd");
        std::fs::write(&path, "stale").unwrap();

        let mpd = Mpd::from_xml(GPAC_MPD).unwrap();
        mpd.save(&path).unwrap();

        let back = Mpd::load(&path).unwrap();
        assert_eq!(back, mpd);
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

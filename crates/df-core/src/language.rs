//! Language table used to label subtitle and audio tracks.
//!
//! Lookups accept either the ISO 639-2 code (`eng`) or the ISO 639-1 code
//! (`en`), case-insensitively. Unknown codes resolve to [`Language::UND`].

use serde::Serialize;

/// Code used when no language can be determined.
pub const UNDETERMINED: &str = "und";

/// A language table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    /// ISO 639-2 code, used in file names and the manifest.
    pub code: &'static str,
    /// ISO 639-1 code, when one exists.
    pub short: Option<&'static str>,
    /// Human-readable label.
    pub label: &'static str,
}

const fn lang(code: &'static str, short: &'static str, label: &'static str) -> Language {
    Language {
        code,
        short: Some(short),
        label,
    }
}

static LANGUAGES: &[Language] = &[
    lang("ara", "ar", "Arabic"),
    lang("bul", "bg", "Bulgarian"),
    lang("cat", "ca", "Catalan"),
    lang("ces", "cs", "Czech"),
    lang("chi", "zh", "Chinese"),
    lang("dan", "da", "Danish"),
    lang("deu", "de", "German"),
    lang("ell", "el", "Greek"),
    lang("eng", "en", "English"),
    lang("est", "et", "Estonian"),
    lang("fin", "fi", "Finnish"),
    lang("fra", "fr", "French"),
    lang("heb", "he", "Hebrew"),
    lang("hin", "hi", "Hindi"),
    lang("hrv", "hr", "Croatian"),
    lang("hun", "hu", "Hungarian"),
    lang("ind", "id", "Indonesian"),
    lang("isl", "is", "Icelandic"),
    lang("ita", "it", "Italian"),
    lang("jpn", "ja", "Japanese"),
    lang("kor", "ko", "Korean"),
    lang("lav", "lv", "Latvian"),
    lang("lit", "lt", "Lithuanian"),
    lang("msa", "ms", "Malay"),
    lang("nld", "nl", "Dutch"),
    lang("nor", "no", "Norwegian"),
    lang("pol", "pl", "Polish"),
    lang("por", "pt", "Portuguese"),
    lang("ron", "ro", "Romanian"),
    lang("rus", "ru", "Russian"),
    lang("slk", "sk", "Slovak"),
    lang("slv", "sl", "Slovenian"),
    lang("spa", "es", "Spanish"),
    lang("srp", "sr", "Serbian"),
    lang("swe", "sv", "Swedish"),
    lang("tha", "th", "Thai"),
    lang("tur", "tr", "Turkish"),
    lang("ukr", "uk", "Ukrainian"),
    lang("vie", "vi", "Vietnamese"),
];

// ISO 639-2/B synonyms still common in container tags.
static BIBLIOGRAPHIC: &[(&str, &str)] = &[
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("may", "msa"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("zho", "chi"),
];

impl Language {
    /// The "undetermined" entry.
    pub const UND: Language = Language {
        code: UNDETERMINED,
        short: None,
        label: "Undetermined",
    };

    /// Look up a code, returning `None` when it is not in the table.
    pub fn lookup(code: &str) -> Option<Language> {
        let code = code.trim().to_ascii_lowercase();
        if code.is_empty() {
            return None;
        }
        let code = BIBLIOGRAPHIC
            .iter()
            .find(|(b, _)| *b == code)
            .map(|(_, t)| t.to_string())
            .unwrap_or(code);

        LANGUAGES
            .iter()
            .find(|l| l.code == code || l.short == Some(code.as_str()))
            .copied()
    }

    /// Look up a code, falling back to [`Language::UND`].
    pub fn resolve(code: &str) -> Language {
        Self::lookup(code).unwrap_or(Self::UND)
    }

    /// Infer a language from the dot-delimited components of a file name.
    ///
    /// For `movie.eng.forced.vtt` the components `eng` and `forced` are
    /// checked in order; the leading base name and trailing extension are
    /// skipped.
    pub fn from_file_name(file_name: &str) -> Language {
        let parts: Vec<&str> = file_name.split('.').collect();
        if parts.len() < 3 {
            return Self::UND;
        }
        parts[1..parts.len() - 1]
            .iter()
            .find_map(|part| Self::lookup(part))
            .unwrap_or(Self::UND)
    }
}

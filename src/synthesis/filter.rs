/*!
 * Qualification of raw detections.
 *
 * A segment contributes to the subtitle track only when its confidence
 * reaches the threshold and its detection's text passes the content gate.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::annotation::TimedSegment;
use crate::errors::SubtitleError;

// CJK Unified Ideographs only, no spacing
static HAN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\x{4e00}-\x{9fff}]+$").unwrap()
});

static HANGUL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Hangul}\s]+$").unwrap()
});

static KANA_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Hiragana}\p{Katakana}\x{30fc}\s]+$").unwrap()
});

static LATIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Latin}\s]+$").unwrap()
});

static CYRILLIC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Cyrillic}\s]+$").unwrap()
});

/// Writing system a detection's text must consist of
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFilter {
    /// No content gate
    #[default]
    Any,
    /// CJK unified ideographs, without spaces
    Han,
    /// Korean hangul, words may be space separated
    Hangul,
    /// Japanese hiragana and katakana
    Kana,
    /// Latin letters
    Latin,
    /// Cyrillic letters
    Cyrillic,
}

impl ScriptFilter {
    fn regex(&self) -> Option<Regex> {
        match self {
            Self::Any => None,
            Self::Han => Some(HAN_REGEX.clone()),
            Self::Hangul => Some(HANGUL_REGEX.clone()),
            Self::Kana => Some(KANA_REGEX.clone()),
            Self::Latin => Some(LATIN_REGEX.clone()),
            Self::Cyrillic => Some(CYRILLIC_REGEX.clone()),
        }
    }
}

impl std::fmt::Display for ScriptFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Han => "han",
            Self::Hangul => "hangul",
            Self::Kana => "kana",
            Self::Latin => "latin",
            Self::Cyrillic => "cyrillic",
        };
        write!(f, "{}", name)
    }
}

/// Confidence and content gate applied before flattening
#[derive(Debug, Clone)]
pub struct QualificationFilter {
    confidence_threshold: f32,
    pattern: Option<Regex>,
}

impl QualificationFilter {
    /// Build a filter. An explicit `text_pattern` takes precedence over `script`.
    pub fn new(
        confidence_threshold: f32,
        script: ScriptFilter,
        text_pattern: Option<&str>,
    ) -> Result<Self, SubtitleError> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(SubtitleError::InvalidSettings(format!(
                "confidence threshold must be within [0, 1], got {}",
                confidence_threshold
            )));
        }

        let pattern = match text_pattern.map(str::trim).filter(|p| !p.is_empty()) {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| SubtitleError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?),
            None => script.regex(),
        };

        Ok(Self {
            confidence_threshold,
            pattern,
        })
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Whether a detection's text may contribute at all
    pub fn accepts_text(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.pattern.as_ref().is_none_or(|re| re.is_match(text))
    }

    /// Whether a segment is confident enough; the threshold is inclusive
    pub fn accepts_segment(&self, segment: &TimedSegment) -> bool {
        segment.confidence >= self.confidence_threshold
    }
}

//! Quality label resolution (spec §4.8).

use std::str::FromStr;

use crate::error::{Error, Result};

/// A requested stream quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quality {
    Best,
    Fixed(&'static str, u32, u32),
}

impl Quality {
    /// Fixed label -> exact `WxH` resolution table (spec §4.8).
    const FIXED: &'static [(&'static str, u32, u32)] = &[
        ("1440p", 2560, 1440),
        ("1080p", 1920, 1080),
        ("720p", 1280, 720),
        ("480p", 852, 480),
        ("360p", 640, 360),
        ("160p", 284, 160),
    ];

    pub fn label(&self) -> &str {
        match self {
            Quality::Best => "best",
            Quality::Fixed(label, _, _) => label,
        }
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "best" {
            return Ok(Quality::Best);
        }
        Self::FIXED
            .iter()
            .find(|(label, _, _)| *label == s)
            .map(|(label, w, h)| Quality::Fixed(label, *w, *h))
            .ok_or_else(|| Error::validation(format!("unknown quality label: {s}")))
    }
}

/// One variant listed in a master playlist's `#EXT-X-STREAM-INF` tag.
#[derive(Debug, Clone)]
pub struct Variant {
    pub width: u32,
    pub height: u32,
    pub url: String,
}

/// Selects the variant matching `quality` from the given list (spec §4.1, §4.8).
///
/// `best` selects the variant with the maximum `(width, height)` pair,
/// comparing width first. A fixed label matches only an exact `WxH`; if no
/// variant has that exact resolution, returns "quality not found".
pub fn select_variant(variants: &[Variant], quality: &Quality) -> Result<String> {
    match quality {
        Quality::Best => variants
            .iter()
            .max_by_key(|v| (v.width, v.height))
            .map(|v| v.url.clone())
            .ok_or_else(|| Error::extractor("no streams available")),
        Quality::Fixed(label, width, height) => variants
            .iter()
            .find(|v| v.width == *width && v.height == *height)
            .map(|v| v.url.clone())
            .ok_or_else(|| Error::extractor(format!("quality {label} not found"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(w: u32, h: u32, url: &str) -> Variant {
        Variant {
            width: w,
            height: h,
            url: url.to_string(),
        }
    }

    #[test]
    fn best_picks_max_width_then_height() {
        let variants = vec![
            variant(1280, 720, "720"),
            variant(1920, 1080, "1080"),
            variant(640, 360, "360"),
        ];
        let chosen = select_variant(&variants, &Quality::Best).unwrap();
        assert_eq!(chosen, "1080");
    }

    #[test]
    fn fixed_label_requires_exact_resolution() {
        let variants = vec![variant(1280, 720, "720")];
        let quality = "1080p".parse::<Quality>().unwrap();
        let err = select_variant(&variants, &quality).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn unknown_label_is_an_error() {
        assert!("4k".parse::<Quality>().is_err());
    }

    #[test]
    fn fixed_label_matches_exact_dimensions() {
        let variants = vec![variant(1280, 720, "720p-stream")];
        let quality = "720p".parse::<Quality>().unwrap();
        assert_eq!(select_variant(&variants, &quality).unwrap(), "720p-stream");
    }
}

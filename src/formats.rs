use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Output kinds a caller can request for a scrape.
///
/// The variant order is the canonical order used for response keys and
/// partial-failure notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Format {
    Markdown,
    Html,
    RawHtml,
    Links,
    Json,
    Screenshot,
    FullPageScreenshot,
}

impl Format {
    pub const ALL: [Format; 7] = [
        Format::Markdown,
        Format::Html,
        Format::RawHtml,
        Format::Links,
        Format::Json,
        Format::Screenshot,
        Format::FullPageScreenshot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Markdown => "markdown",
            Format::Html => "html",
            Format::RawHtml => "rawHtml",
            Format::Links => "links",
            Format::Json => "json",
            Format::Screenshot => "screenshot",
            Format::FullPageScreenshot => "screenshot@fullPage",
        }
    }

    pub fn is_screenshot(self) -> bool {
        matches!(self, Format::Screenshot | Format::FullPageScreenshot)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported format `{0}`")]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.as_str() == tag)
            .ok_or_else(|| UnknownFormat(tag.to_string()))
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Format {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}

/// Comma separated list of every supported tag, for error messages.
pub fn supported_tags() -> String {
    Format::ALL
        .iter()
        .map(|format| format.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_every_tag() {
        for format in Format::ALL {
            assert_eq!(format.as_str().parse::<Format>(), Ok(format));
        }
    }

    #[test]
    fn test_tags_are_case_sensitive() {
        assert!("rawhtml".parse::<Format>().is_err());
        assert!("Markdown".parse::<Format>().is_err());
        assert_eq!(
            "pdf".parse::<Format>(),
            Err(UnknownFormat("pdf".to_string()))
        );
    }

    #[test]
    fn test_formats_as_map_keys() {
        let mut map = BTreeMap::new();
        map.insert(Format::FullPageScreenshot, 1);
        map.insert(Format::Markdown, 2);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"markdown":2,"screenshot@fullPage":1}"#);

        let back: BTreeMap<Format, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_screenshot_kinds() {
        assert!(Format::Screenshot.is_screenshot());
        assert!(Format::FullPageScreenshot.is_screenshot());
        assert!(!Format::Html.is_screenshot());
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed finish vocabulary stored on `colors.finish` / `color_variants.finish_override`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finish {
    Glossy,
    Cream,
    Matte,
    Chrome,
    Shimmer,
    Glitter,
    Metallic,
    Sheer,
    Pearl,
    Magnetic,
    Reflective,
}

impl Finish {
    /// Finish assumed when a source lists nothing recognizable.
    pub const DEFAULT: Finish = Finish::Glossy;

    pub const ALL: [Finish; 11] = [
        Finish::Glossy,
        Finish::Cream,
        Finish::Matte,
        Finish::Chrome,
        Finish::Shimmer,
        Finish::Glitter,
        Finish::Metallic,
        Finish::Sheer,
        Finish::Pearl,
        Finish::Magnetic,
        Finish::Reflective,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Finish::Glossy => "glossy",
            Finish::Cream => "cream",
            Finish::Matte => "matte",
            Finish::Chrome => "chrome",
            Finish::Shimmer => "shimmer",
            Finish::Glitter => "glitter",
            Finish::Metallic => "metallic",
            Finish::Sheer => "sheer",
            Finish::Pearl => "pearl",
            Finish::Magnetic => "magnetic",
            Finish::Reflective => "reflective",
        }
    }

    /// Visual distinctiveness; when a source lists several finishes the
    /// highest one classifies the shade.
    pub fn priority(self) -> u8 {
        match self {
            Finish::Glitter => 100,
            Finish::Reflective => 95,
            Finish::Magnetic => 90,
            Finish::Chrome => 85,
            Finish::Metallic => 80,
            Finish::Shimmer => 70,
            Finish::Pearl => 60,
            Finish::Matte => 50,
            Finish::Cream => 40,
            Finish::Sheer => 35,
            Finish::Glossy => 30,
        }
    }

    /// Map one lowercase token through the synonym table.
    fn from_token(token: &str) -> Option<Finish> {
        let finish = match token {
            "glossy" | "standard" | "high shine" | "shine" => Finish::Glossy,
            "cream" | "creme" => Finish::Cream,
            "matte" | "mat" => Finish::Matte,
            "chrome" | "mirror" => Finish::Chrome,
            "shimmer" | "shimmery" => Finish::Shimmer,
            "glitter" | "glittery" => Finish::Glitter,
            "metallic" | "foil" => Finish::Metallic,
            "sheer" | "milky" => Finish::Sheer,
            "pearl" => Finish::Pearl,
            "magnetic" | "cat-eye" => Finish::Magnetic,
            "reflective" => Finish::Reflective,
            _ => return None,
        };
        Some(finish)
    }
}

impl fmt::Display for Finish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Finish {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Finish::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown finish {s:?}"))
    }
}

/// Resolve a free-text finish/texture field into the closed vocabulary.
///
/// The value is split on `,` and `/`; each token is lowercased, trimmed and
/// mapped through the synonym table. Unknown tokens are ignored and the
/// highest-priority survivor wins. Empty or wholly unrecognized input
/// resolves to [`Finish::DEFAULT`].
pub fn normalize_finish(raw: &str) -> Finish {
    raw.split([',', '/'])
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .filter_map(|token| Finish::from_token(&token))
        .max_by_key(|finish| finish.priority())
        .unwrap_or(Finish::DEFAULT)
}

/// Whole-string category labels used by The GelBottle exports. Checked before
/// token splitting because some combined labels pick a specific finish rather
/// than the priority winner (e.g. "glitter, reflective" is reflective).
fn category_finish(label: &str) -> Option<&'static str> {
    let finish = match label {
        "standard" | "standard finish" => "glossy",
        "shimmer" | "shimmery" => "shimmer",
        "glitter" | "glitter, shimmery" => "glitter",
        "glitter, reflective" | "reflective" => "reflective",
        "chrome" => "chrome",
        "metallic" => "metallic",
        "pearl" => "pearl",
        "sheer" | "milky" | "milky, sheer" => "sheer",
        "magnetic" | "magnetic, cat-eye" | "cat-eye" => "magnetic",
        "matte" => "matte",
        "cream" | "creme" => "cream",
        _ => return None,
    };
    Some(finish)
}

/// Finish for a vendor category column: the category table first, falling
/// back to ordinary token normalization of the raw label.
pub fn normalize_category_finish(raw: &str) -> Finish {
    let label = raw.trim().to_lowercase();
    match category_finish(&label) {
        Some(mapped) => normalize_finish(mapped),
        None => normalize_finish(raw),
    }
}

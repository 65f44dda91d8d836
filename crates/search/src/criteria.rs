//! Filter criteria and their string forms.
//!
//! Every field is a closed enum. Parsing, the constructors and
//! deserialization reject out-of-domain bounds; that is where contract
//! violations surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shelf_core::MAX_RATING;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("invalid price range: {0}")]
    PriceRange(String),
    #[error("price bounds inverted: min {min} > max {max}")]
    InvertedBounds { min: f64, max: f64 },
    #[error("invalid rating: {0}")]
    Rating(String),
    #[error("unknown category: {0}")]
    Category(String),
    #[error("unknown sort key: {0}")]
    SortKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", try_from = "RawPriceRange")]
pub enum PriceRange {
    #[default]
    All,
    Between { min: f64, max: f64 },
    AtLeast { min: f64 },
}

impl PriceRange {
    pub fn between(min: f64, max: f64) -> Result<Self, FilterError> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 {
            return Err(FilterError::PriceRange(format!("{min}-{max}")));
        }
        if min > max {
            return Err(FilterError::InvertedBounds { min, max });
        }
        Ok(Self::Between { min, max })
    }

    pub fn at_least(min: f64) -> Result<Self, FilterError> {
        if !min.is_finite() || min < 0.0 {
            return Err(FilterError::PriceRange(format!("{min}-")));
        }
        Ok(Self::AtLeast { min })
    }

    pub fn admits(&self, price: f64) -> bool {
        match *self {
            Self::All => true,
            Self::Between { min, max } => min <= price && price <= max,
            Self::AtLeast { min } => price >= min,
        }
    }
}

/// Wire shape of `PriceRange`, checked by the constructors on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
enum RawPriceRange {
    All,
    Between { min: f64, max: f64 },
    AtLeast { min: f64 },
}

impl TryFrom<RawPriceRange> for PriceRange {
    type Error = FilterError;

    fn try_from(raw: RawPriceRange) -> Result<Self, Self::Error> {
        match raw {
            RawPriceRange::All => Ok(Self::All),
            RawPriceRange::Between { min, max } => Self::between(min, max),
            RawPriceRange::AtLeast { min } => Self::at_least(min),
        }
    }
}

/// Accepts `all`, `MIN-MAX` and `MIN-` (e.g. `0-20`, `100-`).
impl FromStr for PriceRange {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let (lo, hi) = s.split_once('-').ok_or_else(|| FilterError::PriceRange(s.to_string()))?;
        let min: f64 = lo.trim().parse().map_err(|_| FilterError::PriceRange(s.to_string()))?;
        let hi = hi.trim();
        if hi.is_empty() {
            return Self::at_least(min);
        }
        let max: f64 = hi.parse().map_err(|_| FilterError::PriceRange(s.to_string()))?;
        Self::between(min, max)
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Between { min, max } => write!(f, "{min}-{max}"),
            Self::AtLeast { min } => write!(f, "{min}-"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "RawMinRating")]
pub enum MinRating {
    #[default]
    All,
    AtLeast(u8),
}

impl MinRating {
    pub fn at_least(n: u8) -> Result<Self, FilterError> {
        if n > MAX_RATING {
            return Err(FilterError::Rating(n.to_string()));
        }
        Ok(Self::AtLeast(n))
    }

    pub fn admits(&self, rating: u8) -> bool {
        match *self {
            Self::All => true,
            Self::AtLeast(n) => rating >= n,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
enum RawMinRating {
    All,
    AtLeast(u8),
}

impl TryFrom<RawMinRating> for MinRating {
    type Error = FilterError;

    fn try_from(raw: RawMinRating) -> Result<Self, Self::Error> {
        match raw {
            RawMinRating::All => Ok(Self::All),
            RawMinRating::AtLeast(n) => Self::at_least(n),
        }
    }
}

impl FromStr for MinRating {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let n: u8 = s.trim_end_matches('+').parse().map_err(|_| FilterError::Rating(s.to_string()))?;
        Self::at_least(n)
    }
}

impl fmt::Display for MinRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::AtLeast(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[default]
    All,
    React,
    Python,
    Design,
    Backend,
    Frontend,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::All,
        Category::React,
        Category::Python,
        Category::Design,
        Category::Backend,
        Category::Frontend,
    ];

    /// Lowercase keywords matched by substring against item names.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::All => &[],
            Self::React => &["react", "javascript"],
            Self::Python => &["python", "django"],
            Self::Design => &["design", "ui", "ux"],
            Self::Backend => &["backend", "api", "server"],
            Self::Frontend => &["frontend", "html", "css"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::React => "react",
            Self::Python => "python",
            Self::Design => "design",
            Self::Backend => "backend",
            Self::Frontend => "frontend",
        }
    }

    /// `true` when `name` falls in this category. `All` admits everything.
    pub fn admits(&self, name: &str) -> bool {
        if matches!(self, Self::All) {
            return true;
        }
        let lower = name.to_lowercase();
        self.keywords().iter().any(|kw| lower.contains(kw))
    }
}

impl FromStr for Category {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| FilterError::Category(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Name,
    PriceAsc,
    PriceDesc,
    RatingDesc,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::PriceAsc => "price-low",
            Self::PriceDesc => "price-high",
            Self::RatingDesc => "rating",
        }
    }
}

impl FromStr for SortKey {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "price-low" | "price-asc" => Ok(Self::PriceAsc),
            "price-high" | "price-desc" => Ok(Self::PriceDesc),
            "rating" | "rating-desc" => Ok(Self::RatingDesc),
            other => Err(FilterError::SortKey(other.to_string())),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Full set of criteria applied to raw query results.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub price_range: PriceRange,
    pub min_rating: MinRating,
    pub category: Category,
    pub sort_key: SortKey,
}

/// Single-field update, so each criterion can be set independently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CriteriaChange {
    PriceRange(PriceRange),
    MinRating(MinRating),
    Category(Category),
    SortKey(SortKey),
}

impl FilterCriteria {
    pub fn apply_change(&mut self, change: CriteriaChange) {
        match change {
            CriteriaChange::PriceRange(v) => self.price_range = v,
            CriteriaChange::MinRating(v) => self.min_rating = v,
            CriteriaChange::Category(v) => self.category = v,
            CriteriaChange::SortKey(v) => self.sort_key = v,
        }
    }

    pub fn with(mut self, change: CriteriaChange) -> Self {
        self.apply_change(change);
        self
    }
}

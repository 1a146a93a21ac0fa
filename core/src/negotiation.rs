//! Weighted `Accept` header matching.
//!
//! A candidate media type is scored against the most specific pattern in
//! the header that matches it:
//!
//! ```text
//! score = q - 10 * (number of `*` segments in the pattern)
//! ```
//!
//! so an exact match always outranks a `type/*` match, which always
//! outranks `*/*`, whatever their q-values. Equal scores are won by the
//! candidate declared first. A pattern with `q=0` marks its candidates as
//! not acceptable.

use mime::Mime;
use smallvec::SmallVec;

/// Penalty applied per wildcard segment.
const WILDCARD_PENALTY: f32 = 10.0;

/// One entry of a parsed `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    type_: String,
    subtype: String,
    quality: f32,
}

impl MediaRange {
    /// Parse a single `type/subtype;q=x` entry. Malformed entries yield `None`.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let parsed: Mime = entry.trim().parse().ok()?;
        let quality = match parsed.get_param("q") {
            Some(q) => q.as_str().trim().parse::<f32>().ok()?,
            None => 1.0,
        };
        if !(0.0..=1.0).contains(&quality) {
            return None;
        }
        let type_ = parsed.type_().as_str().to_ascii_lowercase();
        let subtype = parsed.subtype().as_str().to_ascii_lowercase();
        // "*/json" is not a valid range
        if type_ == "*" && subtype != "*" {
            return None;
        }
        Some(Self {
            type_,
            subtype,
            quality,
        })
    }

    /// The pattern as `type/subtype`.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    /// The q-value (1.0 when omitted).
    #[must_use]
    pub const fn quality(&self) -> f32 {
        self.quality
    }

    /// Number of `*` segments: 0, 1 or 2.
    #[must_use]
    pub fn wildcards(&self) -> u8 {
        u8::from(self.type_ == "*") + u8::from(self.subtype == "*")
    }

    /// Whether a concrete `type/subtype` falls under this pattern.
    #[must_use]
    pub fn matches(&self, type_: &str, subtype: &str) -> bool {
        (self.type_ == "*" || self.type_.eq_ignore_ascii_case(type_))
            && (self.subtype == "*" || self.subtype.eq_ignore_ascii_case(subtype))
    }

    fn score(&self) -> f32 {
        self.quality - WILDCARD_PENALTY * f32::from(self.wildcards())
    }
}

/// Parse an `Accept` header, dropping malformed entries.
///
/// An absent or blank header is treated as `*/*`.
#[must_use]
pub fn parse_accept(header: Option<&str>) -> SmallVec<[MediaRange; 4]> {
    let header = header.map(str::trim).filter(|h| !h.is_empty());
    match header {
        Some(header) => header.split(',').filter_map(MediaRange::parse).collect(),
        None => smallvec::smallvec![MediaRange {
            type_: "*".to_string(),
            subtype: "*".to_string(),
            quality: 1.0,
        }],
    }
}

/// The most specific pattern matching `candidate`, if any.
fn most_specific<'r>(ranges: &'r [MediaRange], candidate: &str) -> Option<&'r MediaRange> {
    let (type_, subtype) = split_essence(candidate)?;
    let mut best: Option<&MediaRange> = None;
    for range in ranges.iter().filter(|r| r.matches(type_, subtype)) {
        if best.is_none_or(|b| range.wildcards() < b.wildcards()) {
            best = Some(range);
        }
    }
    best
}

fn split_essence(mime: &str) -> Option<(&str, &str)> {
    let essence = mime.split(';').next()?.trim();
    let (type_, subtype) = essence.split_once('/')?;
    if type_.is_empty() || subtype.is_empty() {
        return None;
    }
    Some((type_, subtype))
}

/// Pick the best candidate for an `Accept` header.
///
/// Candidates are concrete media types in server declaration order.
/// Returns `None` when the header accepts none of them.
///
/// # Examples
///
/// ```
/// use composable_action_core::negotiation::best_match;
///
/// let supported = ["application/json", "application/xml", "text/html"];
/// let accept = "application/json;q=0.6,application/xml;q=0.9,*/*;q=0.8";
/// assert_eq!(best_match(Some(accept), &supported), Some("application/xml"));
/// assert_eq!(best_match(None, &supported), Some("application/json"));
/// ```
#[must_use]
pub fn best_match<'c, S>(header: Option<&str>, candidates: &'c [S]) -> Option<&'c str>
where
    S: AsRef<str>,
{
    let ranges = parse_accept(header);
    let mut winner: Option<(&'c str, f32)> = None;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let Some(range) = most_specific(&ranges, candidate) else {
            continue;
        };
        if range.quality <= 0.0 {
            continue;
        }
        let score = range.score();
        // strictly greater: earlier declarations win ties
        if winner.is_none_or(|(_, best)| score > best) {
            winner = Some((candidate, score));
        }
    }
    winner.map(|(candidate, _)| candidate)
}

/// Whether a single concrete media type is acceptable for `header`.
#[must_use]
pub fn accepts(header: Option<&str>, mime: &str) -> bool {
    let ranges = parse_accept(header);
    most_specific(&ranges, mime).is_some_and(|range| range.quality > 0.0)
}

/// Whether the header is absent, blank, or exactly `*/*`.
#[must_use]
pub fn accepts_anything(header: Option<&str>) -> bool {
    match header.map(str::trim) {
        None | Some("" | "*/*") => true,
        Some(_) => false,
    }
}

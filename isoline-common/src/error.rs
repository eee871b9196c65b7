//! Error types and utilities for the isoline toolkit
//!
//! Library code returns these typed errors. The CLI wraps them with `anyhow`
//! context at the application boundary.

use strsim::{jaro_winkler, normalized_levenshtein};

/// Errors raised by isochrone computation and its request helpers
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The builder was asked to compute without a search context
    #[error("isochrone builder has no search context; call initialize() first")]
    MissingSearchContext,

    /// Range list is empty or contains unusable values
    #[error("invalid ranges: {0}")]
    InvalidRanges(String),

    /// Distance or area units not recognised
    #[error("unknown units '{0}', expected one of m, km, mi")]
    UnknownUnits(String),

    /// Routing profile name not recognised
    #[error("unknown profile '{name}'{}", suggestion_suffix(.suggestion))]
    UnknownProfile {
        name: String,
        suggestion: Option<String>,
    },

    /// Requested isochrone attribute not supported
    #[error("unknown attribute '{0}', expected one of area, reachfactor")]
    UnknownAttribute(String),

    /// Range type not recognised
    #[error("unknown range type '{0}', expected time or distance")]
    UnknownRangeType(String),

    /// Location type not recognised
    #[error("unknown location type '{0}', expected start or destination")]
    UnknownLocationType(String),

    /// Smoothing factor outside 0..=100
    #[error("smoothing factor {0} is outside 0..=100")]
    InvalidSmoothing(f64),

    /// Coordinate could not be parsed or is out of range
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// Graph data is structurally invalid
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// I/O failure while reading or writing graph data
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(", did you mean '{s}'?"),
        None => String::new(),
    }
}

/// Result alias for isoline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Find the best fuzzy match using character-based scoring plus name bonuses
///
/// Combines Jaro-Winkler (70%) and normalized Levenshtein (30%) with:
/// - a prefix bonus for strong similarity on the first seven characters
/// - a part bonus when the input closely matches one hyphen-separated part
///   (`cycling-regular`, `foot-hiking`)
///
/// Candidates scoring below 0.65 are never suggested.
pub fn find_best_fuzzy_match<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let input_lower = input.to_lowercase();
    let mut best_match = None;
    let mut best_score = 0.0f64;

    let min_threshold = 0.65;

    for &candidate in candidates {
        let candidate_lower = candidate.to_lowercase();

        let jw_score = jaro_winkler(&input_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&input_lower, &candidate_lower);
        let combined_score = (jw_score * 0.7) + (lev_score * 0.3);

        let mut bonus = 0.0;

        let prefix_len = input_lower.chars().count().min(7);
        if prefix_len >= 4 {
            let input_prefix = input_lower.chars().take(prefix_len).collect::<String>();
            let candidate_prefix = candidate_lower.chars().take(prefix_len).collect::<String>();

            let prefix_similarity = normalized_levenshtein(&input_prefix, &candidate_prefix);
            if prefix_similarity > 0.7 {
                bonus += 0.2 * prefix_similarity;
            }
        }

        if candidate_lower.contains('-') {
            for part in candidate_lower.split('-') {
                if part.len() >= 4 {
                    let part_similarity = jaro_winkler(&input_lower, part);
                    if part_similarity > 0.85 {
                        bonus += 0.12 * part_similarity;
                    }
                }
            }
        }

        let final_score = combined_score + bonus;

        if final_score >= min_threshold && final_score > best_score {
            best_score = final_score;
            best_match = Some(candidate);
        }
    }

    best_match
}

//! Field extraction from unstructured email text.
//!
//! Two pure-function surfaces:
//! - [`classify`] — lifecycle status from subject + body
//! - [`extract`] — company and title via ordered strategy chains
//!
//! Neither ever fails: unmatched text yields `None` (classification) or the
//! `Unknown Company` / `Unknown Position` sentinels (extraction).

pub mod classify;
pub mod extract;

pub use classify::classify;
pub use extract::{Extraction, UNKNOWN_COMPANY, UNKNOWN_POSITION, extract};

/// Canonical display form for extracted phrases: each whitespace-delimited
/// word lower-cased, then its first letter capitalized. Dedup comparisons
/// downstream are case-insensitive against this form.
pub fn title_case_words(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

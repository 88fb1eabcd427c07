//! Canonical credit-score band table
//!
//! Forms capture credit standing as a selected band, not a raw score. The
//! `minCreditScore` rule compares the band's representative score against
//! the declared threshold. One table, totally ordered worst→best, used by
//! every code path.

/// Band name → representative score, worst→best.
pub const CREDIT_SCORE_BANDS: &[(&str, u32)] = &[
    ("poor", 550),
    ("below-average", 600),
    ("fair", 650),
    ("good", 700),
    ("very-good", 750),
    ("excellent", 780),
];

/// Representative score for a band. Unknown bands score 0 and therefore
/// fail any declared minimum.
pub fn band_score(band: &str) -> u32 {
    let needle = band.trim();
    CREDIT_SCORE_BANDS
        .iter()
        .find(|(name, _)| *name == needle)
        .map(|(_, score)| *score)
        .unwrap_or(0)
}

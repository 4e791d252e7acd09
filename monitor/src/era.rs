//! Game version classification.
//!
//! The game has shipped three structurally incompatible progress schemas over
//! its lifetime (plus a transitional one). Every era-dependent update in the
//! reconciler dispatches on [`Era`], so adding a variant forces each dispatch
//! site to be revisited.
//!
//! | Era | Versions | Advancements | Statistics |
//! |-----|----------|--------------|------------|
//! | [`Era::Legacy`] | `1.0` – `1.6.4` | numeric achievement IDs in the stats file | numeric IDs, lifetime counters |
//! | [`Era::Mid`] | `1.7.2` – `1.11.2` | `achievement.*` keys in the stats file | flat `stat.*` keys |
//! | [`Era::Hybrid`] | `1.12.x` | advancements file | flat `stat.*` keys |
//! | [`Era::Modern`] | `1.13`+ | advancements file | nested `stats.<category>.<item>` |
//!
//! # Example
//!
//! ```
//! use waypost_monitor::era::{Era, GameVersion};
//!
//! assert_eq!(Era::classify("1.6.4"), Era::Legacy);
//! assert_eq!(Era::classify("1.12.2"), Era::Hybrid);
//! assert_eq!(Era::classify("b1.7.3"), Era::Unknown);
//!
//! let version = GameVersion::parse("1.16.1");
//! assert_eq!(version.era(), Era::Modern);
//! assert_eq!(version.playtime_key(), "minecraft:custom/minecraft:play_one_minute");
//! ```

use std::fmt;

/// Legacy statistic ID for ticks played.
pub const LEGACY_PLAYTIME_ID: &str = "1100";

/// Flat playtime statistic used by the mid and hybrid eras.
pub const FLAT_PLAYTIME_KEY: &str = "stat.playOneMinute";

/// Modern playtime address before the 1.17 rename.
pub const MODERN_PLAYTIME_KEY_OLD: &str = "minecraft:custom/minecraft:play_one_minute";

/// Modern playtime address from 1.17 onwards.
pub const MODERN_PLAYTIME_KEY: &str = "minecraft:custom/minecraft:play_time";

/// Schema generation of the external progress files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Era {
    /// `1.0` through `1.6.4`: achievements and stats share one lifetime counter file.
    Legacy,
    /// `1.7.2` through `1.11.2`: per-world stats file carrying achievements.
    Mid,
    /// `1.12.x`: advancements file plus flat stats.
    Hybrid,
    /// `1.13` and later: advancements file plus namespaced stats.
    Modern,
    /// Unrecognised version; all era-specific updates are skipped.
    Unknown,
}

impl Era {
    /// Classifies a version string.
    ///
    /// Total: anything that does not parse maps to [`Era::Unknown`].
    #[must_use]
    pub fn classify(version: &str) -> Self {
        GameVersion::parse(version).era()
    }

    /// Returns `true` when the era carries a schema the engine understands.
    #[must_use]
    pub fn is_known(self) -> bool {
        !matches!(self, Era::Unknown)
    }

    /// Returns `true` when achievements live in the statistics document.
    #[must_use]
    pub fn achievements_in_stats(self) -> bool {
        matches!(self, Era::Legacy | Era::Mid)
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Era::Legacy => "legacy",
            Era::Mid => "mid",
            Era::Hybrid => "hybrid",
            Era::Modern => "modern",
            Era::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Numeric shape of a version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VersionShape {
    /// `major.minor[.patch]`
    Release { major: u32, minor: u32 },
    /// `YYwWWx` weekly snapshot.
    Snapshot { year: u32 },
    Unrecognised,
}

/// A parsed game version together with its era.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameVersion {
    raw: String,
    shape: VersionShape,
}

impl GameVersion {
    /// Parses a version string such as `1.16.1` or `25w14craftmine`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self {
            raw: trimmed.to_string(),
            shape: parse_shape(trimmed),
        }
    }

    /// The version string as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Era this version belongs to.
    #[must_use]
    pub fn era(&self) -> Era {
        match self.shape {
            VersionShape::Release { major: 1, minor, .. } => match minor {
                0..=6 => Era::Legacy,
                7..=11 => Era::Mid,
                12 => Era::Hybrid,
                _ => Era::Modern,
            },
            VersionShape::Snapshot { year, .. } if year >= 18 => Era::Modern,
            _ => Era::Unknown,
        }
    }

    /// Statistic address of the playtime counter for this version.
    ///
    /// Modern versions renamed the counter in 1.17, so the answer depends on
    /// more than the era.
    #[must_use]
    pub fn playtime_key(&self) -> &'static str {
        match self.era() {
            Era::Legacy => LEGACY_PLAYTIME_ID,
            Era::Mid | Era::Hybrid => FLAT_PLAYTIME_KEY,
            Era::Modern => match self.shape {
                VersionShape::Release { minor, .. } if minor < 17 => MODERN_PLAYTIME_KEY_OLD,
                VersionShape::Snapshot { year, .. } if year < 21 => MODERN_PLAYTIME_KEY_OLD,
                _ => MODERN_PLAYTIME_KEY,
            },
            Era::Unknown => MODERN_PLAYTIME_KEY,
        }
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_shape(raw: &str) -> VersionShape {
    if let Some(shape) = parse_release(raw) {
        return shape;
    }
    parse_snapshot(raw).unwrap_or(VersionShape::Unrecognised)
}

fn parse_release(raw: &str) -> Option<VersionShape> {
    let mut parts = raw.split('.');
    let major = parts.next()?.parse::<u32>().ok()?;
    let minor = parts.next()?.parse::<u32>().ok()?;
    if let Some(patch) = parts.next() {
        patch.parse::<u32>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(VersionShape::Release { major, minor })
}

fn parse_snapshot(raw: &str) -> Option<VersionShape> {
    let (year, rest) = raw.split_once('w')?;
    if year.len() != 2 {
        return None;
    }
    let year = year.parse::<u32>().ok()?;
    let week_digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if week_digits.len() != 2 || rest.len() == week_digits.len() {
        return None;
    }
    Some(VersionShape::Snapshot { year })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_release_boundaries() {
        assert_eq!(Era::classify("1.0"), Era::Legacy);
        assert_eq!(Era::classify("1.6.4"), Era::Legacy);
        assert_eq!(Era::classify("1.7.2"), Era::Mid);
        assert_eq!(Era::classify("1.11.2"), Era::Mid);
        assert_eq!(Era::classify("1.12"), Era::Hybrid);
        assert_eq!(Era::classify("1.12.2"), Era::Hybrid);
        assert_eq!(Era::classify("1.13"), Era::Modern);
        assert_eq!(Era::classify("1.21.4"), Era::Modern);
    }

    #[test]
    fn classify_snapshots() {
        assert_eq!(Era::classify("25w14craftmine"), Era::Modern);
        assert_eq!(Era::classify("20w14a"), Era::Modern);
        assert_eq!(Era::classify("13w16a"), Era::Unknown);
    }

    #[test]
    fn classify_unknown_strings() {
        assert_eq!(Era::classify(""), Era::Unknown);
        assert_eq!(Era::classify("b1.7.3"), Era::Unknown);
        assert_eq!(Era::classify("2.0"), Era::Unknown);
        assert_eq!(Era::classify("1.16.1.5"), Era::Unknown);
        assert_eq!(Era::classify("latest"), Era::Unknown);
        assert!(!Era::Unknown.is_known());
    }

    #[test]
    fn classify_trims_whitespace() {
        assert_eq!(Era::classify("  1.8.9\n"), Era::Mid);
    }

    #[test]
    fn playtime_key_follows_rename() {
        assert_eq!(GameVersion::parse("1.5.2").playtime_key(), LEGACY_PLAYTIME_ID);
        assert_eq!(GameVersion::parse("1.8.9").playtime_key(), FLAT_PLAYTIME_KEY);
        assert_eq!(GameVersion::parse("1.12.2").playtime_key(), FLAT_PLAYTIME_KEY);
        assert_eq!(
            GameVersion::parse("1.16.5").playtime_key(),
            MODERN_PLAYTIME_KEY_OLD
        );
        assert_eq!(GameVersion::parse("1.17").playtime_key(), MODERN_PLAYTIME_KEY);
        assert_eq!(
            GameVersion::parse("20w14a").playtime_key(),
            MODERN_PLAYTIME_KEY_OLD
        );
        assert_eq!(
            GameVersion::parse("25w14craftmine").playtime_key(),
            MODERN_PLAYTIME_KEY
        );
    }

    #[test]
    fn achievements_live_in_stats_before_hybrid() {
        assert!(Era::Legacy.achievements_in_stats());
        assert!(Era::Mid.achievements_in_stats());
        assert!(!Era::Hybrid.achievements_in_stats());
        assert!(!Era::Modern.achievements_in_stats());
    }

    #[test]
    fn era_display() {
        assert_eq!(Era::Hybrid.to_string(), "hybrid");
        assert_eq!(GameVersion::parse(" 1.16.1 ").to_string(), "1.16.1");
    }
}

//! Process-wide scoring configuration.
//!
//! Loaded once at startup, wrapped in an `Arc` and never mutated afterwards:
//! changing weights or thresholds requires a restart, so scores stay
//! reproducible for the lifetime of the process.

use std::collections::{HashMap, HashSet};

use chrono::Duration;
use regex::{RegexSet, RegexSetBuilder};
use rust_decimal::Decimal;

use super::{non_empty_env, parse_env};
use crate::models::{Category, Flag};

/// Weight contributed by each signal when it triggers.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    pub high_amount: Decimal,
    pub new_address: Decimal,
    pub off_hours: Decimal,
    pub suspicious_pattern: Decimal,
    pub fee_anomaly: Decimal,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            high_amount: Decimal::new(4, 1),
            new_address: Decimal::new(3, 1),
            off_hours: Decimal::new(1, 1),
            suspicious_pattern: Decimal::new(5, 1),
            fee_anomaly: Decimal::new(2, 1),
        }
    }
}

impl WeightTable {
    pub fn weight(&self, flag: Flag) -> Decimal {
        match flag {
            Flag::HighAmount => self.high_amount,
            Flag::NewAddress => self.new_address,
            Flag::OffHours => self.off_hours,
            Flag::SuspiciousPattern => self.suspicious_pattern,
            Flag::FeeAnomaly => self.fee_anomaly,
            Flag::ProfileUnavailable => Decimal::ZERO,
        }
    }

    fn from_env(defaults: WeightTable) -> anyhow::Result<Self> {
        Ok(Self {
            high_amount: parse_env("RISK_WEIGHT_HIGH_AMOUNT", defaults.high_amount)?,
            new_address: parse_env("RISK_WEIGHT_NEW_ADDRESS", defaults.new_address)?,
            off_hours: parse_env("RISK_WEIGHT_OFF_HOURS", defaults.off_hours)?,
            suspicious_pattern: parse_env("RISK_WEIGHT_SUSPICIOUS_PATTERN", defaults.suspicious_pattern)?,
            fee_anomaly: parse_env("RISK_WEIGHT_FEE_ANOMALY", defaults.fee_anomaly)?,
        })
    }
}

/// UTC hour range `[start_hour, end_hour)`. Wraps past midnight when
/// `start_hour > end_hour`; empty when they are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for QuietWindow {
    fn default() -> Self {
        Self { start_hour: 0, end_hour: 5 }
    }
}

impl QuietWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    /// Parse `"start-end"`, e.g. `"0-5"` or `"22-4"`.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let (start, end) = raw
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("quiet hours must look like 0-5, got {raw}"))?;
        let start_hour: u32 = start.trim().parse()?;
        let end_hour: u32 = end.trim().parse()?;
        if start_hour > 24 || end_hour > 24 {
            anyhow::bail!("quiet hours out of range: {raw}");
        }
        Ok(Self {
            start_hour: start_hour % 24,
            end_hour: end_hour % 24,
        })
    }
}

/// Case-insensitive memo patterns. Entries are regular expressions, so
/// plain words match as substrings.
#[derive(Debug, Clone)]
pub struct MemoDenylist {
    patterns: Vec<String>,
    set: RegexSet,
}

impl MemoDenylist {
    pub fn new<I, S>(patterns: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.trim().is_empty())
            .collect();
        let set = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { patterns, set })
    }

    /// Patterns that match `memo`, in configuration order.
    pub fn matches<'a>(&'a self, memo: &str) -> Vec<&'a str> {
        self.set
            .matches(memo)
            .into_iter()
            .map(|i| self.patterns[i].as_str())
            .collect()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

const DEFAULT_DENYLIST: &[&str] = &["mixer", "tumbler", "launder", "ransom", "darknet"];

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub weights: WeightTable,
    /// `high_amount` fires when amount / 30-day average exceeds this.
    pub high_amount_multiplier: Decimal,
    /// Floor for the 30-day average, so empty histories don't divide by zero.
    pub amount_epsilon: Decimal,
    /// `new_address` fires when the wallet was first seen within this window.
    pub novelty_window: Duration,
    pub quiet_hours: QuietWindow,
    pub memo_denylist: MemoDenylist,
    /// Typical fee per chain (uppercase chain name).
    pub fee_norms: HashMap<String, Decimal>,
    /// `fee_anomaly` fires above `typical * fee_outlier_multiplier`.
    pub fee_outlier_multiplier: Decimal,
    /// Known address → category, checked first by the categorizer.
    pub address_tags: HashMap<String, Category>,
    /// Memo keywords per category, in matcher order.
    pub category_keywords: Vec<(Category, Vec<String>)>,
    pub disabled_signals: HashSet<Flag>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: WeightTable::default(),
            high_amount_multiplier: Decimal::from(3),
            amount_epsilon: Decimal::new(1, 6),
            novelty_window: Duration::hours(48),
            quiet_hours: QuietWindow::default(),
            memo_denylist: MemoDenylist::new(DEFAULT_DENYLIST.iter().copied())
                .expect("default denylist patterns are valid regexes"),
            fee_norms: HashMap::from([("XRPL".to_string(), Decimal::new(1, 5))]),
            fee_outlier_multiplier: Decimal::from(100),
            address_tags: HashMap::new(),
            category_keywords: default_category_keywords(),
            disabled_signals: HashSet::new(),
        }
    }
}

fn default_category_keywords() -> Vec<(Category, Vec<String>)> {
    let words = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect::<Vec<_>>();
    vec![
        (Category::Mixing, words(&["mix", "tumbl", "coinjoin"])),
        (Category::Gambling, words(&["bet", "casino", "dice", "lottery", "jackpot"])),
        (Category::Defi, words(&["stak", "liquidity", "lend", "yield", "farm", "amm"])),
        (Category::Exchange, words(&["deposit", "withdraw", "swap", "trade", "exchange"])),
    ]
}

impl ScoringConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let memo_denylist = match non_empty_env("MEMO_DENYLIST") {
            Some(raw) => MemoDenylist::new(split_list(&raw))?,
            None => defaults.memo_denylist,
        };

        let quiet_hours = match non_empty_env("QUIET_HOURS") {
            Some(raw) => QuietWindow::parse(&raw)?,
            None => defaults.quiet_hours,
        };

        let fee_norms = match non_empty_env("FEE_NORMS") {
            Some(raw) => parse_pairs(&raw, |chain, fee| {
                Ok((chain.to_uppercase(), fee.parse::<Decimal>()?))
            })?,
            None => defaults.fee_norms,
        };

        let address_tags = match non_empty_env("ADDRESS_TAGS") {
            Some(raw) => parse_pairs(&raw, |addr, cat| Ok((addr.to_string(), cat.parse::<Category>()?)))?,
            None => defaults.address_tags,
        };

        let disabled_signals = match non_empty_env("DISABLED_SIGNALS") {
            Some(raw) => split_list(&raw)
                .map(|s| s.parse::<Flag>())
                .collect::<anyhow::Result<HashSet<_>>>()?,
            None => HashSet::new(),
        };

        let novelty_hours: i64 = parse_env("NOVELTY_WINDOW_HOURS", 48)?;

        Ok(Self {
            weights: WeightTable::from_env(defaults.weights)?,
            high_amount_multiplier: parse_env("HIGH_AMOUNT_MULTIPLIER", defaults.high_amount_multiplier)?,
            amount_epsilon: defaults.amount_epsilon,
            novelty_window: Duration::hours(novelty_hours.max(0)),
            quiet_hours,
            memo_denylist,
            fee_norms,
            fee_outlier_multiplier: parse_env("FEE_OUTLIER_MULTIPLIER", defaults.fee_outlier_multiplier)?,
            address_tags,
            category_keywords: defaults.category_keywords,
            disabled_signals,
        })
    }

    pub fn is_enabled(&self, flag: Flag) -> bool {
        !self.disabled_signals.contains(&flag)
    }

    /// Copy with every signal except `keep` disabled. Test helper for
    /// exercising one signal in isolation.
    pub fn only(mut self, keep: &[Flag]) -> Self {
        self.disabled_signals = Flag::EVALUATED
            .into_iter()
            .filter(|f| !keep.contains(f))
            .collect();
        self
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_pairs<K, V, F>(raw: &str, mut parse: F) -> anyhow::Result<HashMap<K, V>>
where
    K: std::hash::Hash + Eq,
    F: FnMut(&str, &str) -> anyhow::Result<(K, V)>,
{
    split_list(raw)
        .map(|entry| {
            let (k, v) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected key=value, got {entry}"))?;
            parse(k.trim(), v.trim())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let w = WeightTable::default();
        assert_eq!(w.weight(Flag::HighAmount), Decimal::new(4, 1));
        assert_eq!(w.weight(Flag::SuspiciousPattern), Decimal::new(5, 1));
        assert_eq!(w.weight(Flag::ProfileUnavailable), Decimal::ZERO);
    }

    #[test]
    fn test_quiet_window_half_open() {
        let w = QuietWindow::default();
        assert!(w.contains(0));
        assert!(w.contains(4));
        assert!(!w.contains(5));
        assert!(!w.contains(23));
    }

    #[test]
    fn test_quiet_window_wraps_midnight() {
        let w = QuietWindow::parse("22-4").unwrap();
        assert!(w.contains(23));
        assert!(w.contains(3));
        assert!(!w.contains(4));
        assert!(!w.contains(12));
    }

    #[test]
    fn test_quiet_window_rejects_garbage() {
        assert!(QuietWindow::parse("midnight").is_err());
        assert!(QuietWindow::parse("3-30").is_err());
    }

    #[test]
    fn test_denylist_is_case_insensitive_and_ordered() {
        let d = MemoDenylist::new(["ransom", "mix(er|ing)"]).unwrap();
        assert_eq!(d.matches("MIXING the RANSOM"), vec!["ransom", "mix(er|ing)"]);
        assert!(d.matches("rent payment").is_empty());
    }

    #[test]
    fn test_denylist_rejects_invalid_pattern() {
        assert!(MemoDenylist::new(["(unclosed"]).is_err());
    }

    #[test]
    fn test_parse_pairs() {
        let tags = parse_pairs("rA=exchange, rB = mixing", |k, v| Ok((k.to_string(), v.parse::<Category>()?))).unwrap();
        assert_eq!(tags.get("rA"), Some(&Category::Exchange));
        assert_eq!(tags.get("rB"), Some(&Category::Mixing));
        assert!(parse_pairs("broken", |k, v| Ok((k.to_string(), v.to_string()))).is_err());
    }

    #[test]
    fn test_only_disables_everything_else() {
        let cfg = ScoringConfig::default().only(&[Flag::OffHours]);
        assert!(cfg.is_enabled(Flag::OffHours));
        assert!(!cfg.is_enabled(Flag::HighAmount));
        assert!(!cfg.is_enabled(Flag::FeeAnomaly));
    }
}

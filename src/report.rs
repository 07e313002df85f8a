//! Log report engine. Re-derives, from the orchestrator log alone, which
//! tracks were the DJ's own idea versus picked from a suggestion pool versus
//! offered but never picked, and assigns each a 0-40 rating normalized to a
//! global mean of 20.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

const TIMESTAMP_LEN: usize = 19;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnStats {
    pub accepted: u32,
    pub rejected: u32,
}

impl OwnStats {
    pub fn total(&self) -> u32 {
        self.accepted + self.rejected
    }
}

/// The three classification buckets extracted from one log scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBuckets {
    /// Tracks first matched on attempt 1, with accept/reject tallies.
    pub own: BTreeMap<String, OwnStats>,
    /// Tracks matched on attempt >= 2 or reclassified via pool removal.
    pub pool_picked: BTreeMap<String, u32>,
    /// Track -> times it appeared in an offered-track listing.
    pub offered: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    /// Case-insensitive substring of the show name.
    pub show: Option<String>,
}

/// Parse a window boundary, accepting partial dates ("2026-02-22" means
/// midnight).
pub fn parse_window_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap());
    }
    Err(format!("Cannot parse timestamp: {}", s))
}

fn line_timestamp(line: &str) -> Option<NaiveDateTime> {
    let rest = line.strip_prefix('[')?;
    if rest.len() < TIMESTAMP_LEN + 1 || !rest.is_char_boundary(TIMESTAMP_LEN) {
        return None;
    }
    if rest.as_bytes()[TIMESTAMP_LEN] != b']' {
        return None;
    }
    NaiveDateTime::parse_from_str(&rest[..TIMESTAMP_LEN], "%Y-%m-%d %H:%M:%S").ok()
}

fn after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|i| &line[i + marker.len()..])
}

/// `SHOW TRANSITION: '{old}' -> '{id}' ({name})`, where the id is a single
/// word. Returns the new show name.
fn transition_show_name(line: &str) -> Option<&str> {
    let rest = after(line, "-> '")?;
    let (id, rest) = rest.split_once('\'')?;
    if id.is_empty() || !id.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let rest = rest.strip_prefix(" (")?;
    let (name, _) = rest.split_once(')')?;
    Some(name)
}

fn strip_news_quote_suffix(track: &str) -> &str {
    let trimmed = track.trim_end();
    if trimmed.ends_with(')') {
        if let Some(i) = trimmed.rfind(" (matches news quote:") {
            return track[..i].trim_end();
        }
    }
    trimmed
}

/// Single forward scan over the log, maintaining the current timestamp,
/// show, attempt number, and whether we are inside an offered-track listing.
pub fn parse_log(content: &str, filter: &ReportFilter) -> LogBuckets {
    let mut buckets = LogBuckets::default();

    let mut in_range = filter.from.is_none();
    // with a show filter, nothing counts until a matching show is seen
    let mut show_matches = filter.show.is_none();
    let mut attempt: u32 = 0;
    let mut reading_offered = false;
    let mut offered_block: Vec<String> = Vec::new();

    let show_filter_lower = filter.show.as_ref().map(|s| s.to_lowercase());

    macro_rules! flush_offered {
        () => {
            if show_matches {
                for t in offered_block.drain(..) {
                    *buckets.offered.entry(t).or_insert(0) += 1;
                }
            } else {
                offered_block.clear();
            }
            reading_offered = false;
        };
    }

    for line in content.lines() {
        if let Some(ts) = line_timestamp(line) {
            if reading_offered {
                flush_offered!();
            }
            in_range = match (filter.from, filter.to) {
                (Some(from), Some(to)) => from <= ts && ts < to,
                (Some(from), None) => ts >= from,
                (None, Some(to)) => ts < to,
                (None, None) => true,
            };
        }
        if !in_range {
            if reading_offered {
                flush_offered!();
            }
            continue;
        }

        if let Some(name) = after(line, "Active show: ") {
            let name = name.trim();
            show_matches = show_filter_lower
                .as_ref()
                .map(|f| name.to_lowercase().contains(f))
                .unwrap_or(true);
            continue;
        }
        if line.contains("SHOW TRANSITION:") {
            if let Some(name) = transition_show_name(line) {
                show_matches = show_filter_lower
                    .as_ref()
                    .map(|f| name.to_lowercase().contains(f))
                    .unwrap_or(true);
                continue;
            }
        }
        if !show_matches {
            if reading_offered {
                flush_offered!();
            }
            continue;
        }

        let stripped = line.trim_start();
        if stripped.starts_with("OTHER RECOMMENDED TRACKS ")
            || stripped.starts_with("NEWS-RELEVANT TRACKS ")
        {
            if reading_offered {
                flush_offered!();
            }
            reading_offered = true;
            continue;
        }
        if reading_offered {
            if stripped.is_empty() || stripped.starts_with('[') {
                continue;
            }
            let track = strip_news_quote_suffix(stripped);
            if !track.is_empty() {
                offered_block.push(track.to_string());
            }
            continue;
        }

        if let Some(rest) = after(line, "--- DJ Attempt ") {
            if let Some((n, _)) = rest.split_once('/') {
                if let Ok(n) = n.parse() {
                    attempt = n;
                }
            }
            continue;
        }

        if let Some(track) = after(line, "SUCCESS: Found track: ") {
            let track = track.trim().to_string();
            if attempt <= 1 {
                buckets.own.entry(track).or_default().accepted += 1;
            } else {
                *buckets.pool_picked.entry(track).or_insert(0) += 1;
            }
            continue;
        }

        // pool removal shortly after an attempt-1 success reclassifies the
        // track: a fresh pool entry can satisfy attempt 1 verbatim
        let removed = after(line, "Removed from pool ")
            .and_then(|rest| rest.split_once(": ").map(|(_, t)| t))
            .or_else(|| after(line, "Removed from suggestion pool: "));
        if let Some(track) = removed {
            let track = track.trim();
            if let Some(stats) = buckets.own.get_mut(track) {
                if stats.accepted > 0 {
                    stats.accepted -= 1;
                    *buckets.pool_picked.entry(track.to_string()).or_insert(0) += 1;
                    if stats.accepted == 0 && stats.rejected == 0 {
                        buckets.own.remove(track);
                    }
                }
            }
            continue;
        }

        let rejected = after(line, "DJ Suggestion REJECTED: '")
            .and_then(|rest| rest.split_once("' is in recent history").map(|(t, _)| t))
            .or_else(|| after(line, "Track NOT FOUND or REJECTED: "));
        if let Some(track) = rejected {
            if attempt <= 1 {
                buckets.own.entry(track.trim().to_string()).or_default().rejected += 1;
            }
            // later-attempt rejections are pool interaction noise
        }
    }
    if reading_offered {
        flush_offered!();
    }

    buckets
}

/// Compute per-track ratings on the 0-40 scale. Ratings stay fractional
/// here; display rounding happens in `format_report`. With no clamping in
/// play, the mean over all rated tracks is exactly 20.
pub fn compute_ratings(buckets: &LogBuckets) -> BTreeMap<String, f64> {
    let mut ratings: BTreeMap<String, f64> = BTreeMap::new();

    // tier 1: the most-repeated own suggestion anchors at 40, the rest decay
    // logarithmically with a floor of 22
    if !buckets.own.is_empty() {
        let max_times = buckets.own.values().map(|s| s.total()).max().unwrap_or(1);
        for (track, stats) in &buckets.own {
            let times = stats.total();
            let r = if max_times <= 1 || times == max_times {
                40.0
            } else {
                (40.0 - (max_times as f64 / times as f64).ln() / 0.139).max(22.0)
            };
            ratings.insert(track.clone(), r);
        }
    }
    let tier1_floor = ratings
        .values()
        .fold(f64::INFINITY, |a, &b| a.min(b))
        .min(40.0);

    // tier 2: picked pool tracks, fewest offers first (fewer chances to be
    // picked earns more credit)
    if !buckets.pool_picked.is_empty() {
        let mut sorted: Vec<&String> = buckets.pool_picked.keys().collect();
        sorted.sort_by_key(|t| buckets.offered.get(*t).copied().unwrap_or(0));
        let n = sorted.len();
        let top = tier1_floor - 1.0;
        let bottom = 21.0;
        for (i, track) in sorted.iter().enumerate() {
            let r = if n == 1 {
                top
            } else {
                top - i as f64 * (top - bottom) / (n as f64 - 1.0)
            };
            let r = r.max(0.0);
            let entry = ratings.entry((*track).clone()).or_insert(f64::NEG_INFINITY);
            if r > *entry {
                *entry = r;
            }
        }
    }

    // tier 3: offered but never picked, spread downward from 19 with the
    // slope solved so the global mean lands on 20
    let not_picked: Vec<(&String, u32)> = buckets
        .offered
        .iter()
        .filter(|(t, _)| !ratings.contains_key(*t))
        .map(|(t, c)| (t, *c))
        .collect();
    if !not_picked.is_empty() {
        let mut sorted = not_picked;
        sorted.sort_by_key(|(_, c)| *c);
        let n3 = sorted.len();
        let total_all = ratings.len() + n3;
        let sum_12: f64 = ratings.values().sum();
        let target_sum = 20.0 * total_all as f64 - sum_12;
        if n3 == 1 {
            let r = target_sum.max(0.0).min(19.0);
            ratings.insert(sorted[0].0.clone(), r);
        } else {
            let step = 2.0 * (n3 as f64 * 19.0 - target_sum) / (n3 as f64 * (n3 as f64 - 1.0));
            for (i, (track, _)) in sorted.iter().enumerate() {
                let r = (19.0 - i as f64 * step).max(0.0);
                ratings.insert((*track).clone(), r);
            }
        }
    }

    ratings
}

fn divider(lines: &mut Vec<String>, c: char, n: usize) {
    lines.push(std::iter::repeat(c).take(n).collect());
}

/// Render the three-section report as text.
pub fn format_report(buckets: &LogBuckets, filter: &ReportFilter) -> String {
    let ratings = compute_ratings(buckets);
    let shown = |track: &str| -> i64 {
        ratings.get(track).map(|r| r.round() as i64).unwrap_or(0)
    };

    let mut lines: Vec<String> = Vec::new();
    divider(&mut lines, '=', 70);
    lines.push("DJ SONG REPORT".to_string());
    divider(&mut lines, '=', 70);

    if filter.from.is_some() || filter.to.is_some() {
        let tf = filter
            .from
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "start".to_string());
        let tt = filter
            .to
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "end".to_string());
        lines.push(format!("Time range: {} -> {}", tf, tt));
    }
    if let Some(show) = &filter.show {
        lines.push(format!("Show filter: {}", show));
    }
    if !ratings.is_empty() {
        let avg: f64 = ratings.values().sum::<f64>() / ratings.len() as f64;
        lines.push(format!(
            "Average rating: {:.1} (target: 20.0) across {} tracks",
            avg,
            ratings.len()
        ));
    }
    lines.push(String::new());

    if !buckets.own.is_empty() {
        divider(&mut lines, '-', 70);
        lines.push("1. DJ'S OWN SUGGESTIONS (not from suggestion pool)".to_string());
        lines.push("   Songs the DJ came up with independently (attempt 1).".to_string());
        lines.push("   Ranked by total times suggested (most -> least).".to_string());
        divider(&mut lines, '-', 70);

        let mut sorted: Vec<(&String, &OwnStats)> = buckets.own.iter().collect();
        sorted.sort_by(|a, b| b.1.total().cmp(&a.1.total()));
        for (i, (track, stats)) in sorted.iter().enumerate() {
            let mut status = Vec::new();
            if stats.accepted > 0 {
                status.push(format!("{}x accepted", stats.accepted));
            }
            if stats.rejected > 0 {
                status.push(format!("{}x rejected/not found", stats.rejected));
            }
            lines.push(format!(
                "   {:3}. [{:>2}] {}  ({}x suggested: {})",
                i + 1,
                shown(track),
                track,
                stats.total(),
                status.join(", ")
            ));
        }
        let total: u32 = buckets.own.values().map(|s| s.total()).sum();
        lines.push(format!(
            "\n   Total: {} unique tracks, {} suggestions",
            sorted.len(),
            total
        ));
    } else {
        divider(&mut lines, '-', 70);
        lines.push("1. DJ'S OWN SUGGESTIONS -- (none)".to_string());
        divider(&mut lines, '-', 70);
    }
    lines.push(String::new());

    if !buckets.pool_picked.is_empty() {
        divider(&mut lines, '-', 70);
        lines.push("2. SONGS PICKED FROM THE SUGGESTION POOL".to_string());
        lines.push("   DJ chose these from the offered pool/news tracks.".to_string());
        lines.push("   Ranked by times offered (least -> most, since fewer".to_string());
        lines.push("   appearances = fewer chances for the DJ to pick them).".to_string());
        divider(&mut lines, '-', 70);

        let mut sorted: Vec<(&String, &u32)> = buckets.pool_picked.iter().collect();
        sorted.sort_by_key(|(t, _)| buckets.offered.get(*t).copied().unwrap_or(0));
        for (i, (track, count)) in sorted.iter().enumerate() {
            let offered = buckets.offered.get(*track).copied().unwrap_or(0);
            lines.push(format!(
                "   {:3}. [{:>2}] {}  ({}x picked, offered {}x)",
                i + 1,
                shown(track),
                track,
                count,
                offered
            ));
        }
        lines.push(format!(
            "\n   Total: {} unique tracks picked from pool",
            sorted.len()
        ));
    } else {
        divider(&mut lines, '-', 70);
        lines.push("2. SONGS PICKED FROM THE SUGGESTION POOL -- (none)".to_string());
        divider(&mut lines, '-', 70);
    }
    lines.push(String::new());

    let not_picked: Vec<(&String, &u32)> = buckets
        .offered
        .iter()
        .filter(|(t, _)| !buckets.own.contains_key(*t) && !buckets.pool_picked.contains_key(*t))
        .collect();
    if !not_picked.is_empty() {
        divider(&mut lines, '-', 70);
        lines.push("3. POOL SONGS OFFERED BUT NOT PICKED BY THE DJ".to_string());
        lines.push("   These tracks were offered to the DJ in the suggestion".to_string());
        lines.push("   pool but the DJ never chose them.".to_string());
        lines.push("   Ranked by times offered (least -> most, since fewer".to_string());
        lines.push("   appearances = fewer chances for the DJ to pick them).".to_string());
        divider(&mut lines, '-', 70);

        let mut sorted = not_picked;
        sorted.sort_by_key(|(_, c)| **c);
        for (i, (track, count)) in sorted.iter().enumerate() {
            lines.push(format!(
                "   {:3}. [{:>2}] {}  (offered {}x)",
                i + 1,
                shown(track),
                track,
                count
            ));
        }
        lines.push(format!(
            "\n   Total: {} tracks offered but not picked",
            sorted.len()
        ));
    } else {
        divider(&mut lines, '-', 70);
        lines.push("3. POOL SONGS OFFERED BUT NOT PICKED -- (none)".to_string());
        divider(&mut lines, '-', 70);
    }

    lines.push(String::new());
    divider(&mut lines, '=', 70);
    lines.join("\n")
}

use crate::track::{Library, Track};
use serde::{Deserialize, Serialize};

/// One alias rewrite rule: any occurrence of `from` in a suggestion is
/// replaced with `to` (case-insensitive) before retrying the search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasRule {
    pub from: String,
    pub to: String,
}

/// Ordered alias table (substring -> canonical spelling).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AliasTable {
    pub rules: Vec<AliasRule>,
}

impl AliasTable {
    /// All candidate rewrites of `text`, one per rule that hits, in table order.
    pub fn rewrites(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for rule in &self.rules {
            if let Some(rewritten) = replace_ci(text, &rule.from, &rule.to) {
                out.push(rewritten);
            }
        }
        out
    }
}

/// Case-insensitive replace-all. Returns None when the pattern never occurs.
/// Works char-wise so case folding cannot desynchronize byte offsets.
fn replace_ci(text: &str, pattern: &str, replacement: &str) -> Option<String> {
    if pattern.is_empty() {
        return None;
    }
    let pat: Vec<char> = pattern.to_lowercase().chars().collect();
    let chars: Vec<char> = text.chars().collect();
    let lower: Vec<char> = chars.iter().flat_map(|c| c.to_lowercase()).collect();
    if chars.len() != lower.len() {
        // Exotic case folds that change length: fall back to exact replace.
        return if text.contains(pattern) {
            Some(text.replace(pattern, replacement))
        } else {
            None
        };
    }
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut hit = false;
    while i < chars.len() {
        if i + pat.len() <= lower.len() && lower[i..i + pat.len()] == pat[..] {
            out.push_str(replacement);
            i += pat.len();
            hit = true;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    if hit { Some(out) } else { None }
}

/// Strip parenthetical notes and "feat./ft." trailers from a suggestion.
///
/// `"X - Y (Live) feat. Z"` becomes `"X - Y"`. Used only by the fuzzy tier;
/// the exact tier keeps qualifiers so a precise version match is never
/// shadowed by a looser one.
pub fn clean_suggestion(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    let lower = out.to_lowercase();
    if lower.len() == out.len() {
        for marker in [" feat.", " feat ", " ft.", " ft "] {
            if let Some(pos) = lower.find(marker) {
                out.truncate(pos);
                break;
            }
        }
    }
    // Collapse whitespace left behind by removed groups
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Maps a free-text `"Artist - Title"` suggestion onto a concrete library
/// track. Tiers, first hit wins: exact substring, alias rewrite, cleaned
/// fuzzy. Matching stays pure substring containment by design; a short
/// artist name may spuriously match an unrelated longer filename, and
/// historical behavior depends on that looseness.
pub struct TrackMatcher<'a> {
    aliases: &'a AliasTable,
}

impl<'a> TrackMatcher<'a> {
    pub fn new(aliases: &'a AliasTable) -> Self {
        TrackMatcher { aliases }
    }

    /// Resolve a suggestion to a library track, or None for "no match".
    pub fn find<'lib>(&self, library: &'lib Library, suggestion: &str) -> Option<&'lib Track> {
        let suggestion = suggestion.trim();
        if suggestion.is_empty() {
            return None;
        }

        // Tier 1: exact raw substring, qualifiers preserved.
        if let Some(track) = library.find_containing(suggestion).into_iter().next() {
            return Some(track);
        }

        // Tier 2: alias rewrites, in table order.
        for rewritten in self.aliases.rewrites(suggestion) {
            if let Some(track) = library.find_containing(&rewritten).into_iter().next() {
                return Some(track);
            }
        }

        // Tier 3: cleaned/fuzzy. Candidates ranked by
        // (not exact_version_match, filename_length - cleaned_length) ascending.
        let cleaned = clean_suggestion(suggestion);
        if cleaned.is_empty() {
            return None;
        }
        let suggestion_lower = suggestion.to_lowercase();
        let mut candidates: Vec<(&Track, (bool, usize))> = library
            .find_containing(&cleaned)
            .into_iter()
            .map(|t| {
                let name = t.file_name();
                let exact_version = name.to_lowercase().contains(&suggestion_lower);
                let excess = name.len().saturating_sub(cleaned.len());
                (t, (!exact_version, excess))
            })
            .collect();
        candidates.sort_by_key(|&(_, key)| key);
        candidates.into_iter().next().map(|(t, _)| t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn library(names: &[&str]) -> Library {
        Library {
            tracks: names
                .iter()
                .map(|n| {
                    crate::track::Track::from_library_path(Path::new(&format!("/music/{}", n)))
                })
                .collect(),
        }
    }

    fn no_aliases() -> AliasTable {
        AliasTable::default()
    }

    #[test]
    fn exact_tier_wins_before_fuzzy() {
        let lib = library(&["Fleetwood Mac - Dreams.mp3", "Dream Theater - Pull Me Under.mp3"]);
        let aliases = no_aliases();
        let matcher = TrackMatcher::new(&aliases);
        let hit = matcher.find(&lib, "Fleetwood Mac - Dreams").unwrap();
        assert_eq!(hit.file_name(), "Fleetwood Mac - Dreams.mp3");
    }

    #[test]
    fn exact_version_is_not_shadowed_by_plain_file() {
        let lib = library(&["X - Y.mp3", "X - Y (Live).mp3"]);
        let aliases = no_aliases();
        let matcher = TrackMatcher::new(&aliases);
        let hit = matcher.find(&lib, "X - Y (Live)").unwrap();
        assert_eq!(hit.file_name(), "X - Y (Live).mp3");
    }

    #[test]
    fn fuzzy_prefers_exact_version_then_shortest() {
        // "X - Y (Radio Edit)" is not in the library verbatim; after cleaning
        // both files match, the shorter plain one wins.
        let lib = library(&["X - Y (Live).mp3", "X - Y.mp3"]);
        let aliases = no_aliases();
        let matcher = TrackMatcher::new(&aliases);
        let hit = matcher.find(&lib, "X - Y (Radio Edit)").unwrap();
        assert_eq!(hit.file_name(), "X - Y.mp3");
    }

    #[test]
    fn fuzzy_strips_feat_trailer() {
        let lib = library(&["Daft Punk - Get Lucky.mp3"]);
        let aliases = no_aliases();
        let matcher = TrackMatcher::new(&aliases);
        let hit = matcher
            .find(&lib, "Daft Punk - Get Lucky feat. Pharrell Williams")
            .unwrap();
        assert_eq!(hit.file_name(), "Daft Punk - Get Lucky.mp3");
    }

    #[test]
    fn alias_tier_rewrites_spelling() {
        let lib = library(&["P!nk - So What.mp3"]);
        let aliases = AliasTable {
            rules: vec![AliasRule {
                from: "Pink".to_string(),
                to: "P!nk".to_string(),
            }],
        };
        let matcher = TrackMatcher::new(&aliases);
        let hit = matcher.find(&lib, "Pink - So What").unwrap();
        assert_eq!(hit.file_name(), "P!nk - So What.mp3");
    }

    #[test]
    fn alias_rules_tried_in_table_order() {
        let lib = library(&[
            "The Who - My Generation.mp3",
            "Who Made Who - My Generation.mp3",
        ]);
        let aliases = AliasTable {
            rules: vec![
                AliasRule {
                    from: "Hoo".to_string(),
                    to: "The Who".to_string(),
                },
                AliasRule {
                    from: "Hoo".to_string(),
                    to: "Who Made Who".to_string(),
                },
            ],
        };
        let matcher = TrackMatcher::new(&aliases);
        let hit = matcher.find(&lib, "Hoo - My Generation").unwrap();
        assert_eq!(hit.file_name(), "The Who - My Generation.mp3");
    }

    #[test]
    fn no_match_returns_none() {
        let lib = library(&["Blur - Song 2.mp3"]);
        let aliases = no_aliases();
        let matcher = TrackMatcher::new(&aliases);
        assert!(matcher.find(&lib, "Oasis - Wonderwall").is_none());
        assert!(matcher.find(&lib, "").is_none());
    }

    #[test]
    fn substring_looseness_is_preserved() {
        // Known fuzziness: a short artist name matches an unrelated filename
        // that happens to contain it. This behavior is deliberate.
        let lib = library(&["Mika - Grace Kelly.mp3"]);
        let aliases = no_aliases();
        let matcher = TrackMatcher::new(&aliases);
        assert!(matcher.find(&lib, "Mika").is_some());
    }

    #[test]
    fn clean_suggestion_removes_groups_and_trailers() {
        assert_eq!(clean_suggestion("X - Y (Live) [Remaster]"), "X - Y");
        assert_eq!(clean_suggestion("A - B ft. C"), "A - B");
        assert_eq!(clean_suggestion("A - B (feat. C)"), "A - B");
    }

    #[test]
    fn replace_ci_replaces_all_occurrences() {
        assert_eq!(
            replace_ci("pink and PINK", "pink", "P!nk").unwrap(),
            "P!nk and P!nk"
        );
        assert!(replace_ci("abc", "xyz", "q").is_none());
    }
}

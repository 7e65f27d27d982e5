use tracing::debug;

use crate::domain::models::{CandidateProfile, RaceCandidate};

/// Names that may differ only by spelling mistakes between both datasets.
pub const NAME_EDIT_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct CandidateMatcherConfig {
    /// Normalized last names whose district is known to disagree between sources.
    pub district_exceptions: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateMatcher {
    config: CandidateMatcherConfig,
}

impl CandidateMatcher {
    pub fn new(config: CandidateMatcherConfig) -> Self {
        Self { config }
    }

    pub fn is_match(&self, profile: &CandidateProfile, candidate: &RaceCandidate) -> bool {
        let last_name = normalize_name(&profile.last_name);
        let district_exempt = self.config.district_exceptions.contains(&last_name);
        if !district_exempt && !same_label(profile.district.as_deref(), candidate.district.as_deref())
        {
            return false;
        }

        let profile_name = normalize_name(&format!("{} {}", profile.first_name, profile.last_name));
        let candidate_name =
            normalize_name(&format!("{} {}", candidate.first_name, candidate.last_name));

        let by_name = levenshtein_distance(&profile_name, &candidate_name) <= NAME_EDIT_THRESHOLD;
        let by_nickname = profile.first_nickname.as_deref().is_some_and(|nickname| {
            let nickname_name = normalize_name(&format!("{nickname} {}", profile.last_name));
            levenshtein_distance(&nickname_name, &candidate_name) <= NAME_EDIT_THRESHOLD
        });
        let by_last_name = levenshtein_distance(&last_name, &normalize_name(&candidate.last_name))
            <= NAME_EDIT_THRESHOLD;
        let by_last_name_parts = last_name_parts_match(profile, candidate);

        let mut matched = by_name || by_nickname || by_last_name || by_last_name_parts;
        if candidate.state.is_some() {
            matched = matched && same_label(profile.state.as_deref(), candidate.state.as_deref());
        }

        debug!(
            profile = %profile_name,
            candidate = %candidate_name,
            matched,
            "compared candidates"
        );
        matched
    }
}

/// Compound last names ("Ocasio Cortez") match when the first names are close and any
/// pair of last name parts is close.
fn last_name_parts_match(profile: &CandidateProfile, candidate: &RaceCandidate) -> bool {
    let first_names_close = levenshtein_distance(
        &normalize_name(&profile.first_name),
        &normalize_name(&candidate.first_name),
    ) <= NAME_EDIT_THRESHOLD;
    if !first_names_close {
        return false;
    }

    let candidate_parts: Vec<String> = candidate
        .last_name
        .split_whitespace()
        .map(normalize_name)
        .collect();
    profile
        .last_name
        .split_whitespace()
        .map(normalize_name)
        .any(|part| {
            candidate_parts
                .iter()
                .any(|other| levenshtein_distance(&part, other) <= NAME_EDIT_THRESHOLD)
        })
}

fn same_label(left: Option<&str>, right: Option<&str>) -> bool {
    left.unwrap_or_default().trim().to_lowercase() == right.unwrap_or_default().trim().to_lowercase()
}

/// Lowercases, strips diacritics and drops dots, dashes and whitespace.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        if c == '.' || c == '-' || c.is_whitespace() || is_combining_mark(c) {
            continue;
        }
        match deburr(c) {
            Some(latin) => normalized.push_str(latin),
            None => normalized.push(c),
        }
    }
    normalized
}

/// Combining diacritical marks left behind by decomposed input.
fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036f}' | '\u{fe20}'..='\u{fe2f}' | '\u{20d0}'..='\u{20ff}')
}

/// Basic Latin for lowercase Latin-1 Supplement and Latin Extended-A letters.
fn deburr(c: char) -> Option<&'static str> {
    let latin = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ð' | 'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĳ' => "ij",
        'ĵ' => "j",
        'ķ' | 'ĸ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' | 'ŋ' => "n",
        'ŉ' => "'n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' | 'ſ' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(latin)
}

pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    if a.is_empty() {
        return b.chars().count();
    }
    if b.is_empty() {
        return a.chars().count();
    }

    let b_chars = b.chars().collect::<Vec<_>>();
    let mut previous = (0..=b_chars.len()).collect::<Vec<_>>();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, left) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, right) in b_chars.iter().enumerate() {
            let substitution_cost = if left == *right { 0 } else { 1 };
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            let substitution = previous[j] + substitution_cost;
            current[j + 1] = deletion.min(insertion).min(substitution);
        }
        previous.clone_from_slice(&current);
    }

    previous[b_chars.len()]
}

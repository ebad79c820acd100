//! Fuzzy string scores on a 0-100 scale.
//!
//! Similarity is the normalized InDel ratio `2 * matches / (len_a + len_b)`
//! computed from a character diff.

use similar::TextDiff;

pub type Scorer = fn(&str, &str) -> f32;

/// Whole-string similarity.
pub fn ratio(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    TextDiff::from_chars(a, b).ratio() * 100.0
}

/// Best similarity of the shorter string against every same-length window of
/// the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f32 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };

    let short_len = short.chars().count();
    if short_len == 0 {
        return 0.0;
    }

    let long_chars: Vec<char> = long.chars().collect();
    if short_len == long_chars.len() {
        return ratio(short, long);
    }

    let mut best = 0.0f32;
    for start in 0..=(long_chars.len() - short_len) {
        let window: String = long_chars[start..start + short_len].iter().collect();
        let score = ratio(short, &window);
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

/// Similarity after sorting whitespace-separated tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> f32 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Highest-scoring choice. Ties keep the earliest choice.
pub fn best_match<'a, I>(query: &str, choices: I, scorer: Scorer) -> Option<(&'a str, f32)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, f32)> = None;
    for choice in choices {
        let score = scorer(query, choice);
        match best {
            Some((_, top)) if top >= score => {}
            _ => best = Some((choice, score)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_full() {
        assert_eq!(ratio("marta", "marta"), 100.0);
        assert_eq!(partial_ratio("yes", "yes please"), 100.0);
    }

    #[test]
    fn partial_ignores_surrounding_words() {
        assert!(partial_ratio("marta", "marta jones") >= 99.0);
        assert!(ratio("marta", "marta jones") < 80.0);
    }

    #[test]
    fn empty_needle_scores_zero() {
        assert_eq!(partial_ratio("", "anything"), 0.0);
    }

    #[test]
    fn token_order_does_not_matter() {
        assert_eq!(token_sort_ratio("jones marta", "marta jones"), 100.0);
    }

    #[test]
    fn best_match_prefers_first_on_ties() {
        let choices = ["alpha", "alpha"];
        let (hit, _) = best_match("alpha", choices.iter().copied(), ratio).unwrap();
        assert_eq!(hit, "alpha");
        assert!(best_match("x", std::iter::empty(), ratio).is_none());
    }
}

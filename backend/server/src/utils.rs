use std::sync::LazyLock;

use regex::Regex;

use crate::models::Profile;

static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_]").unwrap());
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\- ]").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").unwrap());

/// Normal form used to compare company names: letters and digits in any
/// script, hyphens and single spaces, lower-cased.
pub fn sanitize(input: &str) -> String {
    let s = UNDERSCORES.replace_all(input, " ");
    let s = DISALLOWED.replace_all(&s, "");

    SPACES.replace_all(s.trim(), " ").to_lowercase()
}

/// Distinct sanitized companies in a profile's pipeline, in pipeline order.
pub fn companies(profile: &Profile) -> Vec<String> {
    let mut companies: Vec<String> = Vec::new();

    for company in profile.worked_at().map(sanitize) {
        if !company.is_empty() && !companies.contains(&company) {
            companies.push(company);
        }
    }

    companies
}

#[cfg(test)]
mod tests {
    use super::{companies, sanitize};
    use crate::models::{Experience, Profile};

    #[test]
    fn test_basic() {
        assert_eq!(sanitize("hello_world"), "hello world");
        assert_eq!(sanitize("Jane-Street"), "jane-street");
        assert_eq!(sanitize("AT&T_Labs!"), "att labs");
    }

    #[test]
    fn test_leading_trailing_spaces() {
        assert_eq!(sanitize("   Google   "), "google");
        assert_eq!(sanitize("  Two   Sigma  "), "two sigma");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(sanitize("!@#$%^&*()"), "");
        assert_eq!(sanitize("abc123!@#"), "abc123");
    }

    #[test]
    fn test_non_latin_scripts() {
        assert_eq!(sanitize("腾讯"), "腾讯");
        assert_eq!(sanitize("  Société_Générale! "), "société générale");
        assert_eq!(sanitize("ЯНДЕКС"), "яндекс");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("     "), "");
    }

    #[test]
    fn test_companies_are_distinct() {
        let mut profile = Profile::new("Ada", "Lovelace");
        for company in ["Google", "google ", "Meta", "!!!", "腾讯"] {
            profile
                .pipeline
                .push(Experience::new(company, "Eng", "2020").unwrap());
        }

        assert_eq!(companies(&profile), vec!["google", "meta", "腾讯"]);
    }
}

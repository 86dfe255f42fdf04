//! Content rules applied before a comment is stored.

use serde::{Deserialize, Serialize};

use crate::{comment::NewComment, error::ValidationError};

/// Shortest accepted display name, in characters.
pub const NICKNAME_MIN_LENGTH: usize = 2;
/// Longest accepted display name, in characters.
pub const NICKNAME_MAX_LENGTH: usize = 50;
/// Rating used when the visitor does not pick one.
pub const DEFAULT_RATING: u8 = 5;

/// Inclusive bounds for comment bodies, counted in characters after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPolicy {
    /// Lower bound.
    pub min_length: usize,
    /// Upper bound.
    pub max_length: usize,
}

impl ContentPolicy {
    /// Site-wide comments.
    pub const GENERAL: ContentPolicy = ContentPolicy {
        min_length: 10,
        max_length: 1000,
    };
    /// Comments under blog articles.
    pub const ARTICLE: ContentPolicy = ContentPolicy {
        min_length: 20,
        max_length: 1000,
    };

    /// Policy for admin replies: anything non-empty up to `max_length`.
    pub fn reply(self) -> ContentPolicy {
        ContentPolicy {
            min_length: 1,
            max_length: self.max_length,
        }
    }
}

impl Default for ContentPolicy {
    fn default() -> Self {
        ContentPolicy::GENERAL
    }
}

/// A submission that passed every check, trimmed and clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedComment {
    /// Target page.
    pub page_id: String,
    /// Display name.
    pub nickname: String,
    /// Body text.
    pub content: String,
    /// 1..=5.
    pub rating: u8,
}

/// Checks a visitor submission against `policy` and the blocked word list.
pub fn validate_submission(
    input: &NewComment,
    policy: &ContentPolicy,
    blocked_words: &[String],
) -> Result<ValidatedComment, ValidationError> {
    let page_id = validate_page_id(&input.page_id)?;
    let nickname = validate_nickname(&input.nickname)?;
    let content = validate_content(&input.content, policy, blocked_words)?;

    Ok(ValidatedComment {
        page_id,
        nickname,
        content,
        rating: clamp_rating(input.rating),
    })
}

/// Non-empty after trimming.
pub fn validate_page_id(raw: &str) -> Result<String, ValidationError> {
    required("page_id", raw).map(str::to_string)
}

/// Non-empty and 2..=50 characters after trimming.
pub fn validate_nickname(raw: &str) -> Result<String, ValidationError> {
    let nickname = required("nickname", raw)?;
    check_length("nickname", nickname, NICKNAME_MIN_LENGTH, NICKNAME_MAX_LENGTH)?;
    Ok(nickname.to_string())
}

/// Non-empty, within `policy`, and free of blocked words.
pub fn validate_content(
    raw: &str,
    policy: &ContentPolicy,
    blocked_words: &[String],
) -> Result<String, ValidationError> {
    let content = required("content", raw)?;
    check_length("content", content, policy.min_length, policy.max_length)?;
    if contains_blocked_word(content, blocked_words) {
        return Err(ValidationError::BlockedWords);
    }
    Ok(content.to_string())
}

/// Missing ratings default to 5; anything else is clamped into 1..=5.
pub fn clamp_rating(rating: Option<i64>) -> u8 {
    match rating {
        Some(value) => value.clamp(1, 5) as u8,
        None => DEFAULT_RATING,
    }
}

/// Case-insensitive substring match against the configured words.
pub fn contains_blocked_word(content: &str, blocked_words: &[String]) -> bool {
    let lowered = content.to_lowercase();
    blocked_words
        .iter()
        .map(|word| word.trim().to_lowercase())
        .filter(|word| !word.is_empty())
        .any(|word| lowered.contains(&word))
}

fn required<'a>(field: &'static str, raw: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Missing { field })
    } else {
        Ok(trimmed)
    }
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual < min || actual > max {
        return Err(ValidationError::Length {
            field,
            min,
            max,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(nickname: &str, content: &str) -> NewComment {
        NewComment {
            page_id: "home".to_string(),
            nickname: nickname.to_string(),
            content: content.to_string(),
            rating: None,
            ..NewComment::default()
        }
    }

    #[test]
    fn accepts_boundary_lengths() {
        let nickname = "ab";
        let content = "x".repeat(10);
        let validated = validate_submission(&submission(nickname, &content), &ContentPolicy::GENERAL, &[])
            .expect("boundary values should pass");
        assert_eq!(validated.nickname, "ab");
        assert_eq!(validated.rating, DEFAULT_RATING);

        let long_name = "n".repeat(NICKNAME_MAX_LENGTH);
        let long_content = "c".repeat(1000);
        assert!(validate_submission(
            &submission(&long_name, &long_content),
            &ContentPolicy::GENERAL,
            &[]
        )
        .is_ok());
    }

    #[test]
    fn rejects_short_nickname_and_content() {
        let err = validate_submission(&submission("a", "long enough content"), &ContentPolicy::GENERAL, &[])
            .expect_err("one-char nickname");
        assert_eq!(err.field(), "nickname");

        let err = validate_submission(&submission("Ahmet", "too short"), &ContentPolicy::GENERAL, &[])
            .expect_err("nine-char content");
        assert!(matches!(
            err,
            ValidationError::Length {
                field: "content",
                min: 10,
                actual: 9,
                ..
            }
        ));
    }

    #[test]
    fn rejects_long_nickname() {
        let name = "n".repeat(NICKNAME_MAX_LENGTH + 1);
        let err = validate_nickname(&name).expect_err("51 chars");
        assert_eq!(err.field(), "nickname");
    }

    #[test]
    fn whitespace_only_fields_are_missing() {
        let mut input = submission("Ahmet", "valid content here");
        input.page_id = "   ".to_string();
        assert_eq!(
            validate_submission(&input, &ContentPolicy::GENERAL, &[]),
            Err(ValidationError::Missing { field: "page_id" })
        );
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        assert!(validate_nickname("Şü").is_ok());
        assert!(validate_content("çilingir ğ", &ContentPolicy::GENERAL, &[]).is_ok());
    }

    #[test]
    fn article_policy_requires_twenty_characters() {
        let content = "fifteen chars!!";
        assert!(validate_content(content, &ContentPolicy::GENERAL, &[]).is_ok());
        assert!(validate_content(content, &ContentPolicy::ARTICLE, &[]).is_err());
    }

    #[test]
    fn blocked_words_match_case_insensitively() {
        let words = vec!["spam".to_string(), "bahis".to_string()];
        let err = validate_content("Great BAHIS site, call now", &ContentPolicy::GENERAL, &words)
            .expect_err("blocked word");
        assert_eq!(err, ValidationError::BlockedWords);
        assert!(validate_content("Great locksmith, call now", &ContentPolicy::GENERAL, &words).is_ok());
    }

    #[test]
    fn rating_is_clamped_into_range() {
        assert_eq!(clamp_rating(None), 5);
        assert_eq!(clamp_rating(Some(0)), 1);
        assert_eq!(clamp_rating(Some(3)), 3);
        assert_eq!(clamp_rating(Some(42)), 5);
        assert_eq!(clamp_rating(Some(-7)), 1);
    }

    #[test]
    fn values_are_trimmed() {
        let validated = validate_submission(
            &submission("  Ahmet K.  ", "  Great service, arrived in 15 minutes.  "),
            &ContentPolicy::GENERAL,
            &[],
        )
        .expect("valid");
        assert_eq!(validated.nickname, "Ahmet K.");
        assert_eq!(validated.content, "Great service, arrived in 15 minutes.");
    }
}

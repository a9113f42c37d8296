//! Allocation of the short identifiers that name pastes.
//!
//! A slug is either chosen by the author or drawn from the OS random number
//! generator. Random slugs double as unlisted-access tokens, so they must
//! never come from a general-purpose PRNG.

use std::fmt;
use std::sync::LazyLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use tracing::debug;

use crate::db::Database;
use crate::error::Error;

/// Longest slug the schema can store.
pub const MAX_SLUG_LEN: usize = 80;

/// Bytes of entropy in a generated slug.
pub const DEFAULT_RANDOM_LEN: usize = 8;

static SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("slug pattern is valid"));

/// A validated slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug(pub(crate) String);

impl Slug {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check that a candidate slug is non-empty, short enough, and only uses
/// ASCII letters, digits, hyphens and underscores.
pub fn validate(candidate: &str) -> bool {
    candidate.len() <= MAX_SLUG_LEN && SLUG_PATTERN.is_match(candidate)
}

/// Claim a slug chosen by the author.
///
/// The existence check is only a fast path for a friendly error. Two
/// concurrent creators can both pass it; the UNIQUE index on `paste.slug`
/// decides which insert wins.
pub async fn allocate_custom(db: &Database, candidate: &str) -> crate::Result<Slug> {
    if !validate(candidate) {
        return Err(Error::InvalidSlug);
    }

    if db.slug_exists(candidate).await? {
        return Err(Error::SlugTaken(candidate.to_owned()));
    }

    Ok(Slug(candidate.to_owned()))
}

/// Draw random slugs until one is found that no paste owns.
pub async fn allocate_random(db: &Database, length: usize) -> crate::Result<Slug> {
    loop {
        let candidate = random_token(length);
        if !db.slug_exists(&candidate).await? {
            return Ok(Slug(candidate));
        }
        debug!("random slug collided, drawing again");
    }
}

/// Encode `length` bytes from the OS CSPRNG as unpadded URL-safe base64.
fn random_token(length: usize) -> String {
    let mut bytes = vec![0u8; length.max(1)];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;

    use super::*;

    #[test]
    fn accepts_allowed_alphabet() {
        for slug in ["abc", "ABC", "a-b_c", "0", "-", "_", "my-post_2024"] {
            assert!(validate(slug), "{slug}");
        }
    }

    #[test]
    fn rejects_disallowed_characters() {
        for slug in [
            "",
            "my post!",
            "a/b",
            "a.b",
            "a b",
            "ünïcode",
            "tab\there",
            "new\nline",
            "<script>",
            "../etc",
            "abc\n",
        ] {
            assert!(!validate(slug), "{slug:?}");
        }
    }

    #[test]
    fn length_is_capped() {
        assert!(validate(&"a".repeat(MAX_SLUG_LEN)));
        assert!(!validate(&"a".repeat(MAX_SLUG_LEN + 1)));
    }

    #[test]
    fn random_tokens_are_valid_slugs() {
        for _ in 0..100 {
            let token = random_token(DEFAULT_RANDOM_LEN);
            assert!(validate(&token), "{token}");
            // 8 bytes encode to 11 base64 characters without padding
            assert_eq!(token.len(), 11);
        }
    }

    #[tokio::test]
    async fn custom_slug_rejects_invalid_format() {
        let db = Database::in_memory().await.unwrap();
        assert!(matches!(
            allocate_custom(&db, "my post!").await,
            Err(Error::InvalidSlug)
        ));
    }

    #[tokio::test]
    async fn custom_slug_rejects_taken_slug() {
        let db = Database::in_memory().await.unwrap();
        db.insert_paste("abc", "x", "h", Utc::now()).await.unwrap();

        assert!(matches!(
            allocate_custom(&db, "abc").await,
            Err(Error::SlugTaken(slug)) if slug == "abc"
        ));
        assert_eq!(allocate_custom(&db, "abd").await.unwrap().as_str(), "abd");
    }

    #[tokio::test]
    async fn random_slugs_never_collide() {
        let db = Database::in_memory().await.unwrap();
        let mut seen = HashSet::new();

        for _ in 0..1000 {
            let slug = allocate_random(&db, DEFAULT_RANDOM_LEN).await.unwrap();
            assert!(seen.insert(slug.clone()), "duplicate slug {slug}");
            db.insert_paste(slug.as_str(), "x", "h", Utc::now())
                .await
                .unwrap();
        }

        assert_eq!(db.count_pastes().await.unwrap(), 1000);
    }
}

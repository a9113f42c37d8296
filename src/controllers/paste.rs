use std::future::Future;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::Error;
use crate::models::Paste;
use crate::slug::{self, Slug, DEFAULT_RANDOM_LEN};

/// How many times a generated slug is redrawn after losing an insert race.
const MAX_INSERT_ATTEMPTS: usize = 5;

pub async fn create(
    db: &Database,
    content: &str,
    password: &str,
    custom_slug: Option<&str>,
) -> crate::Result<Paste> {
    if content.is_empty() {
        return Err(Error::EmptyContent);
    }
    if password.is_empty() {
        return Err(Error::EmptyPassword);
    }

    let custom_slug = custom_slug.map(str::trim).filter(|s| !s.is_empty());
    let password_hash = hash_password(password)?;

    let paste = match custom_slug {
        Some(candidate) => {
            insert_with_retry(db, content, &password_hash, false, move || {
                slug::allocate_custom(db, candidate)
            })
            .await?
        }
        None => {
            insert_with_retry(db, content, &password_hash, true, move || {
                slug::allocate_random(db, DEFAULT_RANDOM_LEN)
            })
            .await?
        }
    };

    info!(
        "new paste: slug='{slug}', custom={custom}, size={size}",
        slug = paste.slug,
        custom = custom_slug.is_some(),
        size = content.len()
    );

    Ok(paste)
}

/// Insert a paste under the slug drawn from `next_slug`.
///
/// The allocator's existence check can race with another insert, so when
/// `retry` is set a slug that turns out to be taken is replaced with a fresh
/// one, at most [`MAX_INSERT_ATTEMPTS`] times.
async fn insert_with_retry<F, Fut>(
    db: &Database,
    content: &str,
    password_hash: &str,
    retry: bool,
    mut next_slug: F,
) -> crate::Result<Paste>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<Slug>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let slug = next_slug().await?;

        match db
            .insert_paste(slug.as_str(), content, password_hash, Utc::now())
            .await
        {
            Err(Error::SlugTaken(_)) if retry && attempts < MAX_INSERT_ATTEMPTS => {
                warn!("generated slug '{slug}' was claimed concurrently, retrying");
            }
            Err(Error::SlugTaken(_)) if retry => {
                return Err(Error::SlugsExhausted(attempts));
            }
            result => return result,
        }
    }
}

pub async fn get(db: &Database, slug: &str) -> crate::Result<Paste> {
    db.get_paste(slug).await
}

pub async fn update(
    db: &Database,
    slug: &str,
    new_content: &str,
    password: &str,
) -> crate::Result<Paste> {
    let paste = db.get_paste(slug).await?;

    if new_content.is_empty() {
        return Err(Error::EmptyContent);
    }
    if password.is_empty() {
        return Err(Error::EmptyPassword);
    }

    verify_password(&paste.password_hash, password)?;

    // keep updated_at >= created_at even if the clock stepped backwards
    let updated_at = Utc::now().max(paste.created_at);
    let paste = db
        .update_paste_content(slug, new_content, updated_at)
        .await?;

    info!(
        "updated paste: slug='{slug}', size={size}",
        size = new_content.len()
    );

    Ok(paste)
}

/// Hash a password into a PHC string with Argon2id and a fresh salt.
fn hash_password(password: &str) -> crate::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password_hash: &str, password: &str) -> crate::Result<()> {
    let parsed = PasswordHash::new(password_hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(password_hash::Error::Password) => Err(Error::WrongPassword),
        Err(source) => Err(Error::PasswordHash { source }),
    }
}

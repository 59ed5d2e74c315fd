//! Release note caching.
//!
//! Release notes are cached under `release_note:{organization_slug}:{release_slug}`.
//! Slugs are not escaped, so a colon inside a slug can make two different
//! pairs share a key; slugs produced by the application never contain one.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::manager::CacheManager;
use crate::error::CacheError;

const KEY_PREFIX: &str = "release_note";

/// A rendered release note as served by the public site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseNote {
    pub id: String,
    pub organization_slug: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub version: Option<String>,
    pub content_html: String,
    #[serde(default)]
    pub published_at: Option<OffsetDateTime>,
}

/// Generate the cache key for a release note.
#[inline]
pub fn release_note_key(organization_slug: &str, release_slug: &str) -> String {
    format!("{KEY_PREFIX}:{organization_slug}:{release_slug}")
}

/// Release note cache on top of the shared [`CacheManager`].
#[derive(Clone)]
pub struct ReleaseNoteCache {
    manager: Arc<CacheManager>,
}

impl ReleaseNoteCache {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager }
    }

    /// Get a cached release note.
    pub async fn get(
        &self,
        organization_slug: &str,
        release_slug: &str,
    ) -> Result<Option<Arc<ReleaseNote>>, CacheError> {
        let key = release_note_key(organization_slug, release_slug);
        self.manager.get::<ReleaseNote>(&key).await
    }

    /// Cache a release note with the default TTL.
    pub async fn set(&self, organization_slug: &str, release_slug: &str, note: ReleaseNote) {
        let key = release_note_key(organization_slug, release_slug);
        self.manager.set(&key, note).await;
    }

    pub async fn set_with_ttl(
        &self,
        organization_slug: &str,
        release_slug: &str,
        note: ReleaseNote,
        ttl: Duration,
    ) {
        let key = release_note_key(organization_slug, release_slug);
        self.manager.set_with_ttl(&key, note, ttl).await;
    }

    /// Invalidate a single release note (on publish/update/delete).
    pub async fn invalidate(&self, organization_slug: &str, release_slug: &str) {
        let key = release_note_key(organization_slug, release_slug);
        self.manager.delete(&key).await;
    }

    /// Invalidate every cached release note of an organization.
    pub async fn invalidate_organization(&self, organization_slug: &str) {
        let pattern = format!("{KEY_PREFIX}:{organization_slug}:*");
        self.manager.invalidate_pattern(&pattern).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::manager::CachePolicy;
    use time::macros::datetime;

    fn sample(org: &str, slug: &str) -> ReleaseNote {
        ReleaseNote {
            id: format!("{org}-{slug}"),
            organization_slug: org.to_string(),
            slug: slug.to_string(),
            title: format!("Release {slug}"),
            version: Some("1.4.0".into()),
            content_html: "<h1>What's new</h1>".into(),
            published_at: Some(datetime!(2024-03-01 12:00 UTC)),
        }
    }

    fn cache() -> ReleaseNoteCache {
        ReleaseNoteCache::new(Arc::new(CacheManager::local_only(CachePolicy::default())))
    }

    #[test]
    fn test_key_format() {
        assert_eq!(release_note_key("acme", "v1-4"), "release_note:acme:v1-4");
        assert_eq!(
            release_note_key("acme", "v1-4"),
            release_note_key("acme", "v1-4")
        );
        assert_ne!(release_note_key("Acme", "v1"), release_note_key("acme", "v1"));
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = cache();
        let note = sample("acme", "v1-4");
        cache.set("acme", "v1-4", note.clone()).await;

        let cached = cache.get("acme", "v1-4").await.unwrap().unwrap();
        assert_eq!(*cached, note);
        assert!(cache.get("acme", "v1-5").await.unwrap().is_none());
        assert!(cache.get("globex", "v1-4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_is_exact() {
        let cache = cache();
        cache.set("acme", "v1", sample("acme", "v1")).await;
        cache.set("acme", "v10", sample("acme", "v10")).await;

        cache.invalidate("acme", "v1").await;

        assert!(cache.get("acme", "v1").await.unwrap().is_none());
        assert!(cache.get("acme", "v10").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_organization() {
        let cache = cache();
        cache.set("acme", "v1", sample("acme", "v1")).await;
        cache.set("acme", "v2", sample("acme", "v2")).await;
        cache.set("acme-labs", "v1", sample("acme-labs", "v1")).await;

        cache.invalidate_organization("acme").await;

        assert!(cache.get("acme", "v1").await.unwrap().is_none());
        assert!(cache.get("acme", "v2").await.unwrap().is_none());
        assert!(cache.get("acme-labs", "v1").await.unwrap().is_some());
    }
}

//! Content fingerprints and the conditional ("not modified") response policy.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::trace;

/// Client-side cache lifetime sent with every event list response.
///
/// Kept short so repeated polling can short-circuit while stale windows stay
/// around a second.
pub const CACHE_LIFETIME_SECONDS: u32 = 1;

/// Fingerprint of the exact JSON a client would receive for `model`.
pub fn fingerprint<T: Serialize>(model: &T) -> Result<String> {
  let body = serde_json::to_vec(model).map_err(|e| eyre!("Failed to serialize model: {}", e))?;

  // SHA256 hash for stable, fixed-length tokens
  let mut hasher = Sha256::new();
  hasher.update(&body);
  Ok(hex::encode(hasher.finalize()))
}

/// Whether the client's copy is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
  NotModified,
  Modified,
}

/// Compare a freshly computed `etag` with what the client sent.
///
/// A forced refresh always counts as modified, as does a missing token.
pub fn check(etag: &str, force_refresh: bool, client_etag: Option<&str>) -> Freshness {
  match client_etag {
    Some(client) if !force_refresh && client == etag => Freshness::NotModified,
    _ => Freshness::Modified,
  }
}

/// Caching headers for a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheControl {
  pub etag: String,
  pub expiration_seconds: u32,
  /// Tells the client to keep showing what it already has
  pub use_cached_content: bool,
}

/// Either the full model or a signal to reuse the client's cached copy.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalResponse<T> {
  NotModified { cache_control: CacheControl },
  Full { model: T, cache_control: CacheControl },
}

impl<T: Serialize> ConditionalResponse<T> {
  /// Fingerprint `model` and decide what to send back.
  pub fn evaluate(model: T, force_refresh: bool, client_etag: Option<&str>) -> Result<Self> {
    let etag = fingerprint(&model)?;

    match check(&etag, force_refresh, client_etag) {
      Freshness::NotModified => {
        trace!(%etag, "Sending an empty response (matched ETag and refresh=false)");
        Ok(ConditionalResponse::NotModified {
          cache_control: CacheControl {
            etag,
            expiration_seconds: CACHE_LIFETIME_SECONDS,
            use_cached_content: true,
          },
        })
      }
      Freshness::Modified => {
        trace!(%etag, force_refresh, "Sending a full response");
        Ok(ConditionalResponse::Full {
          model,
          cache_control: CacheControl {
            etag,
            expiration_seconds: CACHE_LIFETIME_SECONDS,
            use_cached_content: false,
          },
        })
      }
    }
  }
}

impl<T> ConditionalResponse<T> {
  pub fn cache_control(&self) -> &CacheControl {
    match self {
      ConditionalResponse::NotModified { cache_control } => cache_control,
      ConditionalResponse::Full { cache_control, .. } => cache_control,
    }
  }

  pub fn etag(&self) -> &str {
    &self.cache_control().etag
  }

  /// HTTP status a web front end should answer with.
  pub fn status_code(&self) -> u16 {
    match self {
      ConditionalResponse::NotModified { .. } => 304,
      ConditionalResponse::Full { .. } => 200,
    }
  }

  pub fn model(&self) -> Option<&T> {
    match self {
      ConditionalResponse::NotModified { .. } => None,
      ConditionalResponse::Full { model, .. } => Some(model),
    }
  }

  pub fn is_not_modified(&self) -> bool {
    matches!(self, ConditionalResponse::NotModified { .. })
  }
}

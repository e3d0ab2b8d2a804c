//! Content negotiation: picking one descriptor out of the candidates
//! registered for a resource type.
//!
//! Resolution is a pure function of its inputs. Exact matches are tried for
//! every accepted type in preference order, scanning candidates in
//! registration order, before a `*/*` entry falls back to the first
//! registered candidate.

use crate::core::descriptor::MediaDescriptor;
use crate::core::error::ConnegError;
use crate::core::mime::MimeType;
use crate::core::resource::ResourceType;
use std::sync::Arc;

/// Picks the writer for `resource_type` that best satisfies `accepted`.
pub fn resolve<'a>(
    resource_type: &ResourceType,
    candidates: &'a [Arc<MediaDescriptor>],
    accepted: &[String],
) -> Result<&'a Arc<MediaDescriptor>, ConnegError> {
    let mut eligible = candidates
        .iter()
        .filter(|c| c.resource_type() == resource_type)
        .peekable();

    let Some(first) = eligible.peek().copied() else {
        return Err(ConnegError::NoWriterConfigured {
            resource_type: resource_type.clone(),
        });
    };

    let eligible: Vec<&Arc<MediaDescriptor>> = eligible.collect();

    for mimetype in accepted {
        if let Some(winner) = eligible.iter().copied().find(|c| c.mimetypes().contains(mimetype)) {
            log::debug!("Negotiated {} for {} via {}", winner, resource_type, mimetype);
            return Ok(winner);
        }
    }

    if accepted.iter().any(|m| m == MimeType::ANY.value()) {
        log::debug!("Falling back to {} for {}", first, resource_type);
        return Ok(first);
    }

    Err(ConnegError::NotAcceptable {
        resource_type: resource_type.clone(),
        accepted: accepted.to_vec(),
    })
}

/// Picks the reader for a request body. A missing content type accepts the
/// first registered reader.
pub fn resolve_reader<'a>(
    resource_type: &ResourceType,
    candidates: &'a [Arc<MediaDescriptor>],
    content_type: Option<&str>,
) -> Result<&'a Arc<MediaDescriptor>, ConnegError> {
    let content_type = content_type
        .and_then(|c| c.split(';').next())
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| MimeType::ANY.value().to_string());

    let resolved = resolve(resource_type, candidates, std::slice::from_ref(&content_type));
    resolved.map_err(|e| match e {
        ConnegError::NotAcceptable { resource_type, .. } => ConnegError::UnsupportedMediaType {
            resource_type,
            content_type,
        },
        other => other,
    })
}

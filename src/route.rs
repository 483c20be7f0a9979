//! Route registry.
//!
//! The set of routes is closed: every identifier maps to exactly one
//! [`Route`], and anything else is rejected with
//! [`DispatchError::UnknownRoute`]. The path-style identifiers used by
//! the Kokoro HTTP API are accepted as aliases.

use std::fmt;

use serde_json::Value;

use crate::error::{DispatchError, Result};
use crate::payload::JobPayload;

/// Payload field holding the route identifier.
pub const ENDPOINT_FIELD: &str = "endpoint";
/// Payload field holding the informational HTTP method.
pub const METHOD_FIELD: &str = "method";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    StandardSpeech,
    VoiceCombine,
    CaptionedSpeech,
    Phonemize,
    GenerateFromPhonemes,
    ListVoices,
}

/// Static description of a route.
#[derive(Debug)]
pub struct RouteDescriptor {
    pub route: Route,
    /// Canonical identifier, e.g. `"standard-speech"`
    pub id: &'static str,
    /// Equivalent Kokoro HTTP API path, e.g. `"/v1/audio/speech"`
    pub path: &'static str,
    /// HTTP method of the equivalent API call. Informational only.
    pub method: &'static str,
}

/// Indexed by `Route as usize`.
static REGISTRY: [RouteDescriptor; 6] = [
    RouteDescriptor {
        route: Route::StandardSpeech,
        id: "standard-speech",
        path: "/v1/audio/speech",
        method: "POST",
    },
    RouteDescriptor {
        route: Route::VoiceCombine,
        id: "voice-combine",
        path: "/v1/audio/voices/combine",
        method: "POST",
    },
    RouteDescriptor {
        route: Route::CaptionedSpeech,
        id: "captioned-speech",
        path: "/dev/captioned_speech",
        method: "POST",
    },
    RouteDescriptor {
        route: Route::Phonemize,
        id: "phonemize",
        path: "/dev/phonemize",
        method: "POST",
    },
    RouteDescriptor {
        route: Route::GenerateFromPhonemes,
        id: "generate-from-phonemes",
        path: "/dev/generate_from_phonemes",
        method: "POST",
    },
    RouteDescriptor {
        route: Route::ListVoices,
        id: "list-voices",
        path: "/v1/audio/voices",
        method: "GET",
    },
];

impl Route {
    pub const DEFAULT: Route = Route::StandardSpeech;

    pub fn descriptor(self) -> &'static RouteDescriptor {
        &REGISTRY[self as usize]
    }

    pub fn id(self) -> &'static str {
        self.descriptor().id
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// All registered routes, in declaration order.
pub fn routes() -> &'static [RouteDescriptor] {
    &REGISTRY
}

/// Look up a route by canonical identifier or API path alias.
pub fn lookup(identifier: &str) -> Option<&'static RouteDescriptor> {
    let identifier = identifier.trim();
    REGISTRY
        .iter()
        .find(|descriptor| descriptor.id == identifier || descriptor.path == identifier)
}

/// Resolve the route for a payload. A missing `endpoint` selects
/// standard speech.
pub fn resolve(payload: &JobPayload<'_>) -> Result<&'static RouteDescriptor> {
    let descriptor = match payload.get(ENDPOINT_FIELD) {
        None => Route::DEFAULT.descriptor(),
        Some(Value::String(identifier)) => {
            lookup(identifier).ok_or_else(|| DispatchError::UnknownRoute(identifier.clone()))?
        }
        Some(other) => return Err(DispatchError::UnknownRoute(other.to_string())),
    };

    if let Some(method) = payload.get(METHOD_FIELD).and_then(Value::as_str) {
        if !method.eq_ignore_ascii_case(descriptor.method) {
            log::debug!(
                "Ignoring method hint {method:?} for {}, which is normally {}",
                descriptor.id,
                descriptor.method
            );
        }
    }

    Ok(descriptor)
}

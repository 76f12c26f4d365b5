//! # Backend Registry and Selector
//!
//! Probes which codec backends are usable in the current process, ranks
//! them by preference (accelerated > vectorized > reference), and resolves
//! an optional per-connection backend request to a concrete implementation.
//!
//! The capability table is computed exactly once and is immutable
//! afterwards; sessions read it concurrently without locking. Resolution
//! can never fail: the reference backend has no environment dependency and
//! acts as the universal fallback, so an unknown or unavailable request
//! degrades silently (with a warning log) instead of erroring.

use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;
use tracing::{debug, warn};

use super::accelerated::AcceleratedCodec;
use super::reference::ReferenceCodec;
use super::vectorized::VectorizedCodec;
use super::MulawCodec;
use crate::error::{AppError, AppResult};

static REFERENCE: ReferenceCodec = ReferenceCodec;
static VECTORIZED: VectorizedCodec = VectorizedCodec;
static ACCELERATED: AcceleratedCodec = AcceleratedCodec;

/// The backend variants, in no particular order; preference ranking lives
/// in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Accelerated,
    Vectorized,
    Reference,
}

impl BackendKind {
    /// Canonical external-facing name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Accelerated => "accelerated",
            BackendKind::Vectorized => "vectorized",
            BackendKind::Reference => "reference",
        }
    }

    /// Parse a requested backend name, accepting the aliases clients use.
    /// Returns `None` for unrecognized names; the caller decides fallback.
    fn from_request(name: &str) -> Option<BackendKind> {
        match name.trim().to_ascii_lowercase().as_str() {
            "accelerated" | "native" | "simd" | "avx2" => Some(BackendKind::Accelerated),
            "vectorized" | "table" | "lut" => Some(BackendKind::Vectorized),
            "reference" | "scalar" | "pure" | "portable" => Some(BackendKind::Reference),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the capability table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub available: bool,
}

/// Process-wide, read-only capability table in priority order.
pub struct CodecRegistry {
    descriptors: [BackendDescriptor; 3],
}

impl CodecRegistry {
    /// Run the availability probes once and build the ranked table.
    /// Probes report absence as `false`; they never panic.
    pub fn probe() -> Self {
        let descriptors = [
            BackendDescriptor {
                kind: BackendKind::Accelerated,
                available: AcceleratedCodec::probe(),
            },
            BackendDescriptor {
                kind: BackendKind::Vectorized,
                available: VectorizedCodec::probe(),
            },
            BackendDescriptor {
                kind: BackendKind::Reference,
                available: ReferenceCodec::probe(),
            },
        ];
        for descriptor in &descriptors {
            debug!(
                backend = descriptor.kind.as_str(),
                available = descriptor.available,
                "codec backend probed"
            );
        }
        Self { descriptors }
    }

    /// The shared registry, probed on first access.
    pub fn global() -> &'static CodecRegistry {
        static REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
        REGISTRY.get_or_init(CodecRegistry::probe)
    }

    /// Descriptors in preference order.
    pub fn descriptors(&self) -> &[BackendDescriptor] {
        &self.descriptors
    }

    /// Names of the available backends, best first.
    pub fn available_names(&self) -> Vec<&'static str> {
        self.descriptors
            .iter()
            .filter(|d| d.available)
            .map(|d| d.kind.as_str())
            .collect()
    }

    pub fn is_available(&self, kind: BackendKind) -> bool {
        self.descriptors
            .iter()
            .any(|d| d.kind == kind && d.available)
    }

    /// The highest-priority available backend. The reference backend is
    /// always available, so this cannot miss.
    pub fn best_available(&self) -> BackendKind {
        self.descriptors
            .iter()
            .find(|d| d.available)
            .map(|d| d.kind)
            .unwrap_or(BackendKind::Reference)
    }

    /// Look up a backend by kind, failing when it is unavailable here.
    /// Internal only: `resolve` recovers from this error via fallback, so
    /// it never reaches a caller.
    pub fn by_kind(&self, kind: BackendKind) -> AppResult<ResolvedBackend> {
        if !self.is_available(kind) {
            return Err(AppError::BackendUnavailable(kind.as_str().to_string()));
        }
        Ok(ResolvedBackend::bind(kind))
    }

    /// Resolve an optional backend request to a concrete implementation.
    ///
    /// - absent or empty: the best available backend
    /// - known and available: that backend
    /// - known but unavailable, or unrecognized: the best available
    ///   backend, with a warning as the side channel
    ///
    /// Deterministic and side-effect-free beyond the one-time probe.
    pub fn resolve(&self, requested: Option<&str>) -> ResolvedBackend {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());
        let name = match requested {
            Some(name) => name,
            None => return ResolvedBackend::bind(self.best_available()),
        };

        match BackendKind::from_request(name) {
            Some(kind) => match self.by_kind(kind) {
                Ok(backend) => backend,
                Err(_) => {
                    let fallback = self.best_available();
                    warn!(
                        requested = name,
                        fallback = fallback.as_str(),
                        "requested codec backend unavailable, falling back"
                    );
                    ResolvedBackend::bind(fallback)
                }
            },
            None => {
                let fallback = self.best_available();
                warn!(
                    requested = name,
                    fallback = fallback.as_str(),
                    "unknown codec backend requested, falling back"
                );
                ResolvedBackend::bind(fallback)
            }
        }
    }
}

/// A backend bound to one session for its whole lifetime.
///
/// Copyable handle to a static implementation; there is no re-resolution
/// path — switching backends means opening a new session.
#[derive(Clone, Copy)]
pub struct ResolvedBackend {
    kind: BackendKind,
    codec: &'static dyn MulawCodec,
}

impl ResolvedBackend {
    fn bind(kind: BackendKind) -> Self {
        let codec: &'static dyn MulawCodec = match kind {
            BackendKind::Accelerated => &ACCELERATED,
            BackendKind::Vectorized => &VECTORIZED,
            BackendKind::Reference => &REFERENCE,
        };
        Self { kind, codec }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn encode(&self, samples: &[i16]) -> Vec<u8> {
        self.codec.encode(samples)
    }

    pub fn decode(&self, data: &[u8]) -> Vec<i16> {
        self.codec.decode(data)
    }
}

impl fmt::Debug for ResolvedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedBackend")
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_always_available() {
        let registry = CodecRegistry::probe();
        assert!(registry.is_available(BackendKind::Reference));
        assert!(!registry.available_names().is_empty());
    }

    #[test]
    fn test_priority_order() {
        let registry = CodecRegistry::probe();
        let kinds: Vec<BackendKind> = registry.descriptors().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BackendKind::Accelerated,
                BackendKind::Vectorized,
                BackendKind::Reference
            ]
        );
    }

    #[test]
    fn test_resolve_default_is_best_available() {
        let registry = CodecRegistry::probe();
        assert_eq!(registry.resolve(None).kind(), registry.best_available());
        assert_eq!(registry.resolve(Some("")).kind(), registry.best_available());
        assert_eq!(
            registry.resolve(Some("   ")).kind(),
            registry.best_available()
        );
    }

    #[test]
    fn test_resolve_known_available_backend() {
        let registry = CodecRegistry::probe();
        assert_eq!(
            registry.resolve(Some("reference")).kind(),
            BackendKind::Reference
        );
        if registry.is_available(BackendKind::Vectorized) {
            assert_eq!(
                registry.resolve(Some("vectorized")).kind(),
                BackendKind::Vectorized
            );
        }
    }

    #[test]
    fn test_resolve_aliases() {
        let registry = CodecRegistry::probe();
        assert_eq!(
            registry.resolve(Some("scalar")).kind(),
            BackendKind::Reference
        );
        assert_eq!(
            registry.resolve(Some("PURE")).kind(),
            BackendKind::Reference
        );
        if registry.is_available(BackendKind::Vectorized) {
            assert_eq!(
                registry.resolve(Some("lut")).kind(),
                BackendKind::Vectorized
            );
        }
    }

    #[test]
    fn test_resolve_unknown_never_fails() {
        let registry = CodecRegistry::probe();
        assert_eq!(
            registry.resolve(Some("opus")).kind(),
            registry.best_available()
        );
        assert_eq!(
            registry.resolve(Some("definitely-not-a-codec")).kind(),
            registry.best_available()
        );
    }

    #[test]
    fn test_resolve_unavailable_falls_back() {
        let registry = CodecRegistry::probe();
        // Whatever the host supports, resolving every known name must
        // yield an available backend.
        for name in ["accelerated", "vectorized", "reference"] {
            let resolved = registry.resolve(Some(name));
            assert!(registry.is_available(resolved.kind()));
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = CodecRegistry::probe();
        for _ in 0..3 {
            assert_eq!(registry.resolve(Some("simd")).kind(), {
                registry.resolve(Some("simd")).kind()
            });
            assert_eq!(registry.resolve(None).kind(), registry.best_available());
        }
    }

    #[test]
    fn test_by_kind_reports_unavailable() {
        let registry = CodecRegistry::probe();
        for descriptor in registry.descriptors() {
            let result = registry.by_kind(descriptor.kind);
            if descriptor.available {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(AppError::BackendUnavailable(_))));
            }
        }
    }

    #[test]
    fn test_global_registry_is_stable() {
        let first = CodecRegistry::global();
        let second = CodecRegistry::global();
        assert!(std::ptr::eq(first, second));
    }
}

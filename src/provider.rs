//! Extended-payload capability.
//!
//! The extended record comes from an optional companion component that is
//! versioned separately from the host. The codec talks to it only through
//! [`ExtendedPayloadProvider`]. Companions register with a
//! [`ProviderRegistry`] at start-up. If none matches, the registry hands
//! out [`NoopProvider`] and every extended-data operation becomes a no-op.
//!
//! Payloads move through explicit calls on a provider value. There is no
//! process-wide slot.

use std::fmt;

/// Get/set access to the companion's currently staged payload.
pub trait ExtendedPayloadProvider: Send {
    /// Name the companion registered under.
    fn name(&self) -> &str;

    /// `false` when no companion is present; callers then skip extended data.
    fn is_available(&self) -> bool {
        true
    }

    /// The staged payload, if any.
    fn get(&self) -> Option<Vec<u8>>;

    /// Replace (or clear, with `None`) the staged payload.
    fn set(&mut self, payload: Option<Vec<u8>>);
}

/// Stand-in used when no companion is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvider;

impl ExtendedPayloadProvider for NoopProvider {
    fn name(&self) -> &str { "none" }
    fn is_available(&self) -> bool { false }
    fn get(&self) -> Option<Vec<u8>> { None }
    fn set(&mut self, _: Option<Vec<u8>>) {}
}

/// In-memory provider holding one staged payload.
///
/// Create one per save or load and pass it down explicitly.
#[derive(Debug, Clone, Default)]
pub struct StagedPayload {
    name:    String,
    payload: Option<Vec<u8>>,
}

impl StagedPayload {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), payload: None }
    }

    pub fn with_payload(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self { name: name.into(), payload: Some(payload) }
    }
}

impl ExtendedPayloadProvider for StagedPayload {
    fn name(&self) -> &str { &self.name }
    fn get(&self) -> Option<Vec<u8>> { self.payload.clone() }
    fn set(&mut self, payload: Option<Vec<u8>>) { self.payload = payload; }
}

type Factory = Box<dyn Fn() -> Box<dyn ExtendedPayloadProvider> + Send + Sync>;

/// Start-up registry of companion providers.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<(String, Factory)>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(n, _)| n)).finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a companion under `name`. Later registrations never
    /// shadow earlier ones.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ExtendedPayloadProvider> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(provider = %name, "extended payload provider registered");
        self.entries.push((name, Box::new(factory)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the first provider whose name ends with `suffix`
    /// (ASCII case-insensitive), falling back to [`NoopProvider`].
    pub fn resolve(&self, suffix: &str) -> Box<dyn ExtendedPayloadProvider> {
        tracing::debug!(candidates = self.entries.len(), suffix, "resolving extended payload provider");
        let suffix = suffix.to_ascii_lowercase();
        match self.entries.iter().find(|(n, _)| n.to_ascii_lowercase().ends_with(&suffix)) {
            Some((name, factory)) => {
                tracing::info!(provider = %name, "extended payload support enabled");
                factory()
            }
            None => {
                tracing::info!("no extended payload provider found; extended data disabled");
                Box::new(NoopProvider)
            }
        }
    }
}

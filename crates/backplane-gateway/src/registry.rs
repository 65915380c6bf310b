//! Backend registry - maps logical names to probe/executor pairs

use std::collections::BTreeMap;
use std::sync::Arc;

use backplane_core::{BackendKind, BackendProbe, QueryExecutor};
use tracing::{info, warn};

/// A backend's probe and executor
#[derive(Clone)]
pub struct RegisteredBackend {
    kind: BackendKind,
    probe: Arc<dyn BackendProbe>,
    executor: Arc<dyn QueryExecutor>,
}

impl RegisteredBackend {
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn probe(&self) -> &Arc<dyn BackendProbe> {
        &self.probe
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }
}

impl std::fmt::Debug for RegisteredBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredBackend")
            .field("name", &self.probe.name())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Name → backend mapping.
///
/// Built once at startup and shared read-only behind an `Arc`.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, RegisteredBackend>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe/executor pair under `name`, replacing any previous one
    pub fn register(
        &mut self,
        name: impl Into<String>,
        probe: Arc<dyn BackendProbe>,
        executor: Arc<dyn QueryExecutor>,
    ) {
        let name = name.into();
        let kind = probe.kind();
        if executor.kind() != kind {
            warn!(
                backend = %name,
                probe_kind = %kind,
                executor_kind = %executor.kind(),
                "Probe and executor disagree on backend kind"
            );
        }
        info!(backend = %name, kind = %kind, "Registering backend");
        self.backends.insert(
            name,
            RegisteredBackend {
                kind,
                probe,
                executor,
            },
        );
    }

    /// Register a backend that implements both roles
    pub fn register_backend<B>(&mut self, backend: Arc<B>)
    where
        B: BackendProbe + QueryExecutor + 'static,
    {
        let name = BackendProbe::name(backend.as_ref()).to_string();
        self.register(name, backend.clone(), backend);
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredBackend> {
        self.backends.get(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegisteredBackend)> {
        self.backends.iter().map(|(name, backend)| (name.as_str(), backend))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

//! Shared dependencies handed to every backend adapter.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use toke_core::{BackendResult, BackendSettings, DataLayout, Platform, Provider};
use tracing::{info, warn};

use crate::install::{EmbeddedBundle, HubManifestSource, ManifestSource, ServerLocator, build_client};

/// Everything an adapter needs besides its model.
#[derive(Clone)]
pub struct AdapterContext {
    pub layout: DataLayout,
    pub settings: Arc<BackendSettings>,
    pub platform: Platform,
    pub bundle: Option<EmbeddedBundle>,
    pub locator: ServerLocator,
    pub client: Client,
    pub manifests: Arc<dyn ManifestSource>,
}

impl fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterContext")
            .field("layout", &self.layout)
            .field("settings", &self.settings)
            .field("platform", &self.platform)
            .field("bundle", &self.bundle)
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

impl AdapterContext {
    /// Context for the current platform, fetching manifests from the hub.
    pub fn new(layout: DataLayout, settings: BackendSettings) -> BackendResult<Self> {
        let client = build_client().map_err(io::Error::other)?;
        Ok(Self {
            locator: ServerLocator::new(layout.clone()),
            layout,
            settings: Arc::new(settings),
            platform: Platform::current(),
            bundle: None,
            manifests: Arc::new(HubManifestSource::new(client.clone())),
            client,
        })
    }

    #[must_use]
    pub fn with_bundle(mut self, bundle: EmbeddedBundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    #[must_use]
    pub const fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_manifest_source(mut self, manifests: Arc<dyn ManifestSource>) -> Self {
        self.manifests = manifests;
        self
    }

    #[must_use]
    pub fn with_locator(mut self, locator: ServerLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Bundled server file `name`, without touching the network.
    ///
    /// Tries the embedded bundle (extracting it if needed), then the
    /// executable's `backends/` directory, then `<data>/bin/`.
    pub async fn bundled_server(&self, provider: Provider, name: &str) -> Option<PathBuf> {
        if let Some(bundle) = &self.bundle {
            match bundle.ensure_extracted(&self.layout).await {
                Ok(()) => {
                    let path = self.layout.backends_dir().join(name);
                    if path.exists() {
                        info!(%provider, path = %path.display(), "Using embedded server");
                        return Some(path);
                    }
                }
                Err(e) => warn!(%provider, error = %e, "Failed to extract embedded backends"),
            }
        }

        let found = self.locator.locate(name);
        if let Some(path) = &found {
            info!(%provider, path = %path.display(), "Using bundled server");
        }
        found
    }
}

//! Shared helpers for unit and integration tests.

pub mod test_helpers {
    use crate::models::{SearchQuery, ServerDescriptor};
    use crate::provision::{PackageInstaller, ProvisionError};
    use crate::registry::RegistryClient;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Builds a descriptor with sensible test defaults.
    pub fn descriptor(id: &str) -> ServerDescriptor {
        ServerDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            repository: format!("https://example.com/{}", id),
            package: None,
            version: "latest".to_string(),
            capabilities: Vec::new(),
            tools: Vec::new(),
            author: "Unknown".to_string(),
            popularity: 0,
            last_updated: Utc::now(),
        }
    }

    pub fn descriptor_with(
        id: &str,
        tools: &[&str],
        popularity: u64,
        last_updated: DateTime<Utc>,
    ) -> ServerDescriptor {
        ServerDescriptor {
            tools: tools.iter().map(|t| t.to_string()).collect(),
            popularity,
            last_updated,
            ..descriptor(id)
        }
    }

    /// Registry source that answers a fixed list and counts its calls.
    pub struct StaticRegistry {
        name: &'static str,
        results: Vec<ServerDescriptor>,
        calls: AtomicUsize,
    }

    impl StaticRegistry {
        pub fn new(name: &'static str, results: Vec<ServerDescriptor>) -> Self {
            Self {
                name,
                results,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RegistryClient for StaticRegistry {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(&self, _query: &SearchQuery) -> Vec<ServerDescriptor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results.clone()
        }
    }

    /// Installer that records requested packages instead of shelling out.
    pub struct RecordingInstaller {
        installed: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingInstaller {
        pub fn succeeding() -> Self {
            Self {
                installed: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                installed: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn installed(&self) -> Vec<String> {
            self.installed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }
    }

    #[async_trait]
    impl PackageInstaller for RecordingInstaller {
        async fn install(&self, package: &str, _install_root: &Path) -> Result<(), ProvisionError> {
            if self.fail {
                return Err(ProvisionError::InstallFailed {
                    package: package.to_string(),
                    reason: "simulated failure".to_string(),
                });
            }
            self.installed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(package.to_string());
            Ok(())
        }
    }
}

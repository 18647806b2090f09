//! Clients shared by logical name.
//!
//! A registry builds at most one [`Client`] per name and hands the same
//! instance to every caller afterwards, so pool warm-up is paid once. Names
//! are meant to be a small fixed set chosen at compile time; entries live
//! until [`Registry::remove`] is called.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use dashmap::DashMap;

use crate::{Client, ClientConfig, ClientOption, ClientProfile, ConfigError};

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Named client cache.
///
/// Each name owns a slot. The map's shard lock is only held long enough to
/// find or insert a slot; construction runs under the slot's own lock, so a
/// slow build never stalls lookups of other names.
#[derive(Debug, Default)]
pub struct Registry {
    slots: DashMap<String, Arc<Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    client: OnceLock<Arc<Client>>,
    building: Mutex<()>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry for callers that do not own one.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Returns the client registered under `name`, building it from
    /// `options` if this is the first use.
    ///
    /// Options only take effect on the call that creates the entry; later
    /// calls get the cached client whatever they pass. Use
    /// [`Registry::get_or_create_strict`] to reject such mismatches.
    pub fn get_or_create<I>(&self, name: &str, options: I) -> Result<Arc<Client>, ConfigError>
    where
        I: IntoIterator<Item = ClientOption>,
    {
        self.get_or_insert_with(name, || {
            ClientConfig::from_options(options).and_then(Client::build)
        })
    }

    /// Same as [`Registry::get_or_create`] with an already assembled config.
    pub fn get_or_create_with_config(
        &self,
        name: &str,
        config: ClientConfig,
    ) -> Result<Arc<Client>, ConfigError> {
        self.get_or_insert_with(name, || Client::build(config))
    }

    /// Registers a loaded profile under its own name.
    pub fn get_or_create_profile(&self, profile: &ClientProfile) -> Result<Arc<Client>, ConfigError> {
        self.get_or_create_with_config(&profile.name, profile.config.clone())
    }

    /// Like [`Registry::get_or_create`], but fails with
    /// [`ConfigError::Mismatch`] when `name` is already registered with a
    /// different configuration.
    pub fn get_or_create_strict<I>(&self, name: &str, options: I) -> Result<Arc<Client>, ConfigError>
    where
        I: IntoIterator<Item = ClientOption>,
    {
        let config = ClientConfig::from_options(options)?;
        let expected = config.clone().resolved();
        let client = self.get_or_create_with_config(name, config)?;
        if client.config() != &expected {
            #[cfg(feature = "tracing")]
            tracing::warn!(name, "client already registered with a different configuration");
            return Err(ConfigError::Mismatch {
                name: name.to_owned(),
            });
        }
        Ok(client)
    }

    /// Returns the client built under `name`, if any. Never builds.
    pub fn get(&self, name: &str) -> Option<Arc<Client>> {
        self.slots
            .get(name)
            .and_then(|slot| slot.client.get().cloned())
    }

    /// Drops the registry's handle on `name`. Callers holding the client keep
    /// using it; the next lookup builds a new one.
    pub fn remove(&self, name: &str) -> Option<Arc<Client>> {
        self.slots
            .remove(name)
            .and_then(|(_, slot)| slot.client.get().cloned())
    }

    /// Number of built clients.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.client.get().is_some())
            .count()
    }

    /// Returns true when no client has been built yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .iter()
            .filter(|slot| slot.client.get().is_some())
            .map(|slot| slot.key().clone())
            .collect();
        names.sort();
        names
    }

    /// A built slot is read without its build lock. Otherwise that lock
    /// serializes racers on the same name so the client is built exactly
    /// once. A failed build removes the slot again.
    ///
    /// `build` must not touch this registry.
    fn get_or_insert_with<F>(&self, name: &str, build: F) -> Result<Arc<Client>, ConfigError>
    where
        F: FnOnce() -> Result<Client, ConfigError>,
    {
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }

        loop {
            let slot = self.slot(name);
            if let Some(client) = slot.client.get() {
                return Ok(Arc::clone(client));
            }

            let _building = slot
                .building
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(client) = slot.client.get() {
                return Ok(Arc::clone(client));
            }
            // A failed build may have dropped this slot while we waited.
            if !self.holds(name, &slot) {
                continue;
            }

            return match build() {
                Ok(client) => {
                    let client = Arc::new(client);
                    let _ = slot.client.set(Arc::clone(&client));
                    #[cfg(feature = "tracing")]
                    tracing::debug!(name, "registered http client");
                    Ok(client)
                }
                Err(err) => {
                    self.slots
                        .remove_if(name, |_, current| Arc::ptr_eq(current, &slot));
                    Err(err)
                }
            };
        }
    }

    fn slot(&self, name: &str) -> Arc<Slot> {
        if let Some(slot) = self.slots.get(name) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.slots.entry(name.to_owned()).or_default().value())
    }

    fn holds(&self, name: &str, slot: &Arc<Slot>) -> bool {
        self.slots
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current.value(), slot))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Barrier,
    };
    use std::thread;
    use std::time::{Duration, Instant};

    use super::Registry;
    use crate::{
        with_retry_count, with_timeout, with_timeout_str, Client, ClientConfig, ClientProfile,
        ConfigError,
    };

    #[test]
    fn concurrent_first_use_builds_once() {
        let registry = Arc::new(Registry::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let builds = Arc::clone(&builds);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry
                        .get_or_insert_with("shared", || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            Client::build(ClientConfig::default())
                        })
                        .expect("client must build")
                })
            })
            .collect();

        let clients: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread must not panic"))
            .collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        assert!(clients.iter().all(|client| Arc::ptr_eq(client, &clients[0])));
    }

    #[test]
    fn slow_build_does_not_block_other_names() {
        let registry = Arc::new(Registry::new());
        let template = Client::build(ClientConfig::default()).unwrap();
        let names: Vec<String> = (0..1024).map(|i| format!("cached-{i}")).collect();
        for name in &names {
            registry
                .get_or_insert_with(name, || Ok(template.clone()))
                .unwrap();
        }

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let builder = {
            let registry = Arc::clone(&registry);
            let template = template.clone();
            thread::spawn(move || {
                registry.get_or_insert_with("slow", move || {
                    started_tx.send(()).unwrap();
                    let _ = release_rx.recv_timeout(Duration::from_secs(5));
                    Ok(template)
                })
            })
        };
        started_rx.recv().unwrap();

        let lookups = Instant::now();
        for name in &names {
            assert!(registry.get(name).is_some());
            registry
                .get_or_insert_with(name, || panic!("cached name {name} was rebuilt"))
                .unwrap();
        }
        registry
            .get_or_insert_with("fresh", || Ok(template.clone()))
            .unwrap();
        let waited = lookups.elapsed();

        release_tx.send(()).unwrap();
        builder.join().unwrap().unwrap();

        assert!(waited < Duration::from_secs(1), "lookups waited {waited:?}");
        assert_eq!(registry.len(), names.len() + 2);
    }

    #[test]
    fn waiter_builds_after_a_failed_build() {
        let registry = Arc::new(Registry::new());
        let (started_tx, started_rx) = mpsc::channel();

        let failing = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.get_or_insert_with("flaky", move || {
                    started_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(100));
                    Err(ConfigError::EmptyName)
                })
            })
        };
        started_rx.recv().unwrap();

        let client = registry
            .get_or_insert_with("flaky", || Client::build(ClientConfig::default()))
            .expect("waiter must build its own client");

        assert!(failing.join().unwrap().is_err());
        let cached = registry.get("flaky").expect("second build must be cached");
        assert!(Arc::ptr_eq(&client, &cached));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn first_configuration_wins() {
        let registry = Registry::new();
        let first = registry
            .get_or_create("orders", [with_retry_count(3)])
            .unwrap();
        let second = registry
            .get_or_create("orders", [with_retry_count(0)])
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().retry_count, 3);
    }

    #[test]
    fn strict_lookup_rejects_mismatch_and_accepts_match() {
        let registry = Registry::new();
        registry
            .get_or_create("search", [with_timeout(Duration::from_millis(200))])
            .unwrap();

        let same = registry.get_or_create_strict("search", [with_timeout_str("200ms")]);
        assert!(same.is_ok());

        let err = registry
            .get_or_create_strict("search", [with_timeout_str("2s")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Mismatch { ref name } if name == "search"));
    }

    #[test]
    fn failed_build_is_not_cached() {
        let registry = Registry::new();
        let err = registry
            .get_or_create("broken", [with_timeout_str("forever")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
        assert!(registry.get("broken").is_none());

        registry
            .get_or_create("broken", [with_timeout_str("1s")])
            .expect("a later valid build must succeed");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = Registry::new();
        let err = registry.get_or_create_with_config("", ClientConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyName));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_forgets_the_entry() {
        let registry = Registry::new();
        let first = registry
            .get_or_create_with_config("tmp", ClientConfig::default())
            .unwrap();
        assert!(registry.remove("tmp").is_some());
        let second = registry
            .get_or_create_with_config("tmp", ClientConfig::default())
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn profiles_register_under_their_name() {
        let registry = Registry::new();
        let profiles: Vec<ClientProfile> = serde_json::from_str(
            r#"[
                { "name": "users", "timeout": "300ms", "retry_count": 2 },
                { "name": "audit", "retry_count": 0 }
            ]"#,
        )
        .unwrap();

        for profile in &profiles {
            registry.get_or_create_profile(profile).unwrap();
        }

        assert_eq!(registry.names(), vec!["audit".to_owned(), "users".to_owned()]);
        let users = registry.get("users").unwrap();
        assert_eq!(users.config().timeout, Duration::from_millis(300));
        assert_eq!(users.config().retry_count, 2);
    }

    #[test]
    fn global_registry_is_a_singleton() {
        assert!(std::ptr::eq(Registry::global(), Registry::global()));
    }
}

//! Integration tests for vault-cache

mod support {
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;
    use vault_cache::cache::{record_map, CacheDefinition, CacheKey, Decryptor, Record, RecordMap};
    use vault_cache::{VaultCacheError, VaultCacheResult};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Cipher {
        pub id: String,
        pub revision: u32,
        pub payload: String,
    }

    impl Record for Cipher {
        fn id(&self) -> &str {
            &self.id
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Plain {
        pub id: String,
        pub revision: u32,
        pub text: String,
    }

    impl Record for Plain {
        fn id(&self) -> &str {
            &self.id
        }
    }

    pub fn cipher(id: &str, revision: u32, payload: &str) -> Cipher {
        Cipher {
            id: id.to_string(),
            revision,
            payload: payload.to_string(),
        }
    }

    pub fn ciphers(records: &[(&str, u32, &str)]) -> RecordMap<Cipher> {
        record_map(
            records
                .iter()
                .map(|(id, revision, payload)| cipher(id, *revision, payload)),
        )
    }

    /// Re-decrypt only records whose revision moved
    pub fn revision_changed(input: &Cipher, previous: Option<&Plain>) -> bool {
        previous.map_or(true, |previous| previous.revision != input.revision)
    }

    /// Decryptor that records every call and can be gated or made to fail
    #[derive(Default)]
    pub struct RecordingDecryptor {
        calls: Mutex<Vec<Vec<String>>>,
        gate: Option<Arc<Semaphore>>,
        failing: AtomicBool,
    }

    impl RecordingDecryptor {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Every call blocks until a permit is added to the returned gate
        pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            let decryptor = Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::default()
            };
            (Arc::new(decryptor), gate)
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Sorted ids handed over in each call
        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Decryptor<Cipher, Plain> for RecordingDecryptor {
        async fn decrypt(&self, records: Vec<Cipher>) -> VaultCacheResult<Vec<Plain>> {
            let mut ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
            ids.sort();
            self.calls.lock().unwrap().push(ids);

            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|_| VaultCacheError::Internal("gate closed".to_string()))?
                    .forget();
            }

            if self.failing.load(Ordering::SeqCst) {
                return Err(VaultCacheError::DecryptionFailed("boom".to_string()));
            }

            Ok(records
                .into_iter()
                .map(|r| Plain {
                    id: r.id,
                    revision: r.revision,
                    text: r.payload.to_uppercase(),
                })
                .collect())
        }
    }

    pub fn key() -> CacheKey {
        CacheKey::new("vault", "ciphers").unwrap()
    }

    pub fn definition(decryptor: Arc<RecordingDecryptor>) -> CacheDefinition<Cipher, Plain> {
        CacheDefinition::new(key())
            .with_should_update(revision_changed)
            .with_decryptor(decryptor)
    }

    /// Poll `condition` until it holds, failing after a few seconds
    pub async fn eventually(condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }
}

mod cache_tests {
    use super::support::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use vault_cache::cache::{
        DecryptionStatus, EncryptedInput, ExecutionContext, LocalVaultCache, VaultCache,
        VaultCacheProvider,
    };
    use vault_cache::state::{MemoryStateStore, SlotKey, StateStore};
    use vault_cache::VaultCacheError;

    const WAIT: Duration = Duration::from_secs(5);

    fn local_provider(store: Arc<dyn StateStore>) -> VaultCacheProvider<Plain> {
        VaultCacheProvider::new(store, "u1", ExecutionContext::Local)
    }

    fn value_slot() -> SlotKey {
        SlotKey::new("vault", "u1", "ciphers")
    }

    #[tokio::test]
    async fn decrypts_only_changed_records() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha"), ("b", 1, "bravo")])));
        let first = cache.decrypt(false).await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first["a"].text, "ALPHA");

        input.publish(Some(ciphers(&[
            ("a", 1, "alpha"),
            ("b", 2, "bravo2"),
            ("c", 1, "charlie"),
        ])));
        let second = cache.decrypt(false).await.unwrap().unwrap();

        assert_eq!(second.len(), 3);
        assert_eq!(second["a"], first["a"]);
        assert_eq!(second["b"].text, "BRAVO2");
        assert_eq!(
            decryptor.calls(),
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["b".to_string(), "c".to_string()]
            ]
        );
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Complete);
    }

    #[tokio::test]
    async fn removed_records_drop_out_of_value() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha"), ("b", 1, "bravo")])));
        cache.decrypt(false).await.unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha")])));
        let value = cache.decrypt(false).await.unwrap().unwrap();

        assert_eq!(value.len(), 1);
        assert!(value.contains_key("a"));
        assert_eq!(decryptor.call_count(), 1);
    }

    #[tokio::test]
    async fn unchanged_input_skips_decryption() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();

        let records = ciphers(&[("a", 1, "alpha"), ("b", 1, "bravo")]);
        input.publish(Some(records.clone()));
        let first = cache.decrypt(false).await.unwrap();

        input.publish(Some(records));
        let second = cache.decrypt(false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(decryptor.call_count(), 1);
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Complete);
    }

    #[tokio::test]
    async fn ignore_cache_decrypts_everything_again() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha"), ("b", 1, "bravo")])));
        cache.decrypt(false).await.unwrap();
        cache.decrypt(true).await.unwrap();

        assert_eq!(decryptor.call_count(), 2);
        assert_eq!(decryptor.calls()[1], vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn null_input_yields_null_value_without_decrypting() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha")])));
        cache.decrypt(false).await.unwrap();

        input.publish(None);
        assert_eq!(cache.decrypt(false).await.unwrap(), None);
        assert_eq!(cache.value().await.unwrap(), None);
        assert_eq!(decryptor.call_count(), 1);
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Complete);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_value() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();

        input.publish(Some(ciphers(&[])));
        let value = cache.decrypt(false).await.unwrap();

        assert_eq!(value.map(|v| v.len()), Some(0));
        assert_eq!(decryptor.call_count(), 0);
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Complete);
    }

    #[tokio::test]
    async fn unpublished_input_returns_persisted_value() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        let provider = local_provider(store);
        let cache = provider
            .cache(&definition(Arc::clone(&decryptor)), &EncryptedInput::new())
            .unwrap();

        assert_eq!(cache.decrypt(false).await.unwrap(), None);
        assert_eq!(decryptor.call_count(), 0);
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Cleared);
    }

    #[tokio::test]
    async fn clear_resets_value_and_status() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha")])));
        cache.decrypt(false).await.unwrap();

        cache.clear().await.unwrap();
        assert_eq!(cache.value().await.unwrap(), None);
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Cleared);

        // The same input is decrypted again after a clear
        let value = cache.decrypt(false).await.unwrap().unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(decryptor.call_count(), 2);
    }

    #[tokio::test]
    async fn newer_input_supersedes_pass_in_flight() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let (decryptor, gate) = RecordingDecryptor::gated();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();
        let mut subscription = cache.subscribe().await.unwrap();

        input.publish(Some(ciphers(&[("a", 1, "old")])));
        let waiting = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.decrypt(false).await })
        };
        subscription
            .wait_for_status(WAIT, |s| s == DecryptionStatus::InProgress)
            .await
            .unwrap();
        eventually(|| decryptor.call_count() == 1).await;

        input.publish(Some(ciphers(&[("a", 2, "new")])));
        gate.add_permits(2);

        let value = waiting.await.unwrap().unwrap().unwrap();
        assert_eq!(value["a"].text, "NEW");
        assert_eq!(decryptor.call_count(), 2);

        let persisted = cache.value().await.unwrap().unwrap();
        assert_eq!(persisted["a"].revision, 2);
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Complete);
    }

    #[tokio::test]
    async fn null_input_supersedes_pass_in_flight() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let (decryptor, gate) = RecordingDecryptor::gated();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();
        let mut subscription = cache.subscribe().await.unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha")])));
        let waiting = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.decrypt(false).await })
        };
        subscription
            .wait_for_status(WAIT, |s| s == DecryptionStatus::InProgress)
            .await
            .unwrap();
        eventually(|| decryptor.call_count() == 1).await;

        input.publish(None);
        gate.add_permits(1);

        assert_eq!(waiting.await.unwrap().unwrap(), None);
        subscription
            .wait_for_status(WAIT, |s| !s.is_pending())
            .await
            .unwrap();
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Cleared);
        assert_eq!(cache.value().await.unwrap(), None);
        assert_eq!(decryptor.call_count(), 1);
    }

    #[tokio::test]
    async fn external_write_supersedes_pass_in_flight() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let (decryptor, gate) = RecordingDecryptor::gated();
        let provider = local_provider(Arc::clone(&store));
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();
        let mut subscription = cache.subscribe().await.unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha")])));
        let waiting = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.decrypt(false).await })
        };
        subscription
            .wait_for_status(WAIT, |s| s == DecryptionStatus::InProgress)
            .await
            .unwrap();
        eventually(|| decryptor.call_count() == 1).await;

        store
            .update(
                &value_slot(),
                Some(json!({"x": {"id": "x", "revision": 9, "text": "EXTERNAL"}})),
            )
            .await
            .unwrap();

        let value = waiting.await.unwrap().unwrap().unwrap();
        assert_eq!(value["x"].text, "EXTERNAL");

        // The stale pass never lands, even once it could proceed
        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let persisted = cache.value().await.unwrap().unwrap();
        assert!(persisted.contains_key("x"));
        assert!(!persisted.contains_key("a"));
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Complete);
    }

    #[tokio::test]
    async fn clear_discards_pass_in_flight() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let (decryptor, gate) = RecordingDecryptor::gated();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();
        let mut subscription = cache.subscribe().await.unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha")])));
        subscription
            .wait_for_status(WAIT, |s| s == DecryptionStatus::InProgress)
            .await
            .unwrap();

        cache.clear().await.unwrap();
        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.value().await.unwrap(), None);
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Cleared);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_instance_and_one_pass() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let (decryptor, gate) = RecordingDecryptor::gated();
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let definition = definition(Arc::clone(&decryptor));

        let first = provider.cache(&definition, &input).unwrap();
        let second = provider.cache(&definition, &input).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        input.publish(Some(ciphers(&[("a", 1, "alpha"), ("b", 1, "bravo")])));
        let mut subscription = first.subscribe().await.unwrap();
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let cache = if i % 2 == 0 {
                    Arc::clone(&first)
                } else {
                    Arc::clone(&second)
                };
                tokio::spawn(async move { cache.decrypt(false).await })
            })
            .collect();

        subscription
            .wait_for_status(WAIT, |s| s == DecryptionStatus::InProgress)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.add_permits(1);

        for handle in handles {
            let value = handle.await.unwrap().unwrap().unwrap();
            assert_eq!(value.len(), 2);
        }
        assert_eq!(decryptor.call_count(), 1);
    }

    #[tokio::test]
    async fn decryption_failure_sets_error_status_and_recovers() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        decryptor.set_failing(true);
        let provider = local_provider(store);
        let input = EncryptedInput::new();
        let cache = provider.cache(&definition(Arc::clone(&decryptor)), &input).unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha")])));
        let err = cache.decrypt(false).await.unwrap_err();
        assert!(matches!(err, VaultCacheError::DecryptionFailed(ref m) if m == "boom"));
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Error);

        decryptor.set_failing(false);
        let value = cache.decrypt(false).await.unwrap().unwrap();
        assert_eq!(value["a"].text, "ALPHA");
        assert_eq!(cache.status().await.unwrap(), DecryptionStatus::Complete);
    }

    #[tokio::test]
    async fn idle_cache_is_evicted_and_restarts_lazily() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let decryptor = RecordingDecryptor::new();
        let definition =
            definition(Arc::clone(&decryptor)).with_cleanup_delay(Duration::from_millis(50));
        let input = EncryptedInput::new();
        let cache = LocalVaultCache::new(&definition, input.clone(), store, "u1").unwrap();

        input.publish(Some(ciphers(&[("a", 1, "alpha")])));
        cache.decrypt(false).await.unwrap();
        assert!(cache.is_active());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!cache.is_active());

        // A subscriber keeps the driver alive past the delay
        let subscription = cache.subscribe().await.unwrap();
        assert_eq!(cache.subscriber_count(), 1);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(cache.is_active());
        assert_eq!(subscription.value().unwrap().unwrap().len(), 1);

        drop(subscription);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.subscriber_count(), 0);
        assert!(!cache.is_active());

        // Persisted value survived eviction; new input is picked up
        assert_eq!(cache.value().await.unwrap().unwrap().len(), 1);
        input.publish(Some(ciphers(&[("a", 1, "alpha"), ("b", 1, "bravo")])));
        let value = cache.decrypt(false).await.unwrap().unwrap();
        assert_eq!(value.len(), 2);
        assert_eq!(decryptor.calls()[1], vec!["b".to_string()]);
    }
}

mod remote_tests {
    use super::support::*;
    use std::sync::Arc;
    use vault_cache::cache::{
        CacheDefinition, CacheKey, DecryptionStatus, EncryptedInput, ExecutionContext, VaultCache,
        VaultCacheProvider,
    };
    use vault_cache::config::CacheConfig;
    use vault_cache::remote::{
        message_channel, UpdateVaultStateFinished, UpdateVaultStateRequest, VaultStateResponder,
    };
    use vault_cache::state::{MemoryStateStore, StateStore};
    use vault_cache::VaultCacheError;

    struct Topology {
        owner: VaultCacheProvider<Plain>,
        proxy: VaultCacheProvider<Plain>,
        input: EncryptedInput<Cipher>,
    }

    /// Owner and proxy sharing mirrored cells, wired through in-process channels
    fn topology(decryptor: Arc<RecordingDecryptor>) -> Topology {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let owner = VaultCacheProvider::new(Arc::clone(&store), "u1", ExecutionContext::Local);
        let input = EncryptedInput::new();
        owner.cache(&definition(decryptor), &input).unwrap();

        let (request_sink, requests) = message_channel::<UpdateVaultStateRequest>();
        let (finished_sink, completions) = message_channel::<UpdateVaultStateFinished>();

        let responder = Arc::new(VaultStateResponder::new(
            Arc::clone(owner.registry()),
            Arc::new(finished_sink),
        ));
        responder.serve(requests);

        let config = CacheConfig {
            remote_timeout_secs: 5,
            ..CacheConfig::default()
        };
        let client = Arc::new(config.remote_client(Arc::new(request_sink)));
        client.listen(completions);

        let proxy = VaultCacheProvider::new(store, "u1", ExecutionContext::Remote(client));
        Topology {
            owner,
            proxy,
            input,
        }
    }

    fn proxy_definition(name: &str) -> CacheDefinition<Cipher, Plain> {
        CacheDefinition::new(CacheKey::new("vault", name).unwrap())
    }

    #[tokio::test]
    async fn proxy_decrypt_round_trips_through_owner() {
        let decryptor = RecordingDecryptor::new();
        let topology = topology(Arc::clone(&decryptor));
        topology
            .input
            .publish(Some(ciphers(&[("a", 1, "alpha"), ("b", 1, "bravo")])));

        let proxy = topology
            .proxy
            .cache(&proxy_definition("ciphers"), &EncryptedInput::new())
            .unwrap();
        assert_eq!(proxy.mode_name(), "remote");

        let value = proxy.decrypt(false).await.unwrap().unwrap();
        assert_eq!(value.len(), 2);
        assert_eq!(value["b"].text, "BRAVO");
        assert_eq!(proxy.status().await.unwrap(), DecryptionStatus::Complete);
        assert_eq!(decryptor.call_count(), 1);

        proxy.clear().await.unwrap();
        assert_eq!(proxy.value().await.unwrap(), None);
        assert_eq!(proxy.status().await.unwrap(), DecryptionStatus::Cleared);

        topology.owner.shutdown().await;
    }

    #[tokio::test]
    async fn proxy_surfaces_owner_failure() {
        let decryptor = RecordingDecryptor::new();
        decryptor.set_failing(true);
        let topology = topology(decryptor);
        topology.input.publish(Some(ciphers(&[("a", 1, "alpha")])));

        let proxy = topology
            .proxy
            .cache(&proxy_definition("ciphers"), &EncryptedInput::new())
            .unwrap();
        let err = proxy.decrypt(false).await.unwrap_err();

        match err {
            VaultCacheError::RemoteRequestFailed { message, .. } => assert_eq!(message, "boom"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(proxy.status().await.unwrap(), DecryptionStatus::Error);
    }

    #[tokio::test]
    async fn unknown_cache_key_fails_request() {
        let topology = topology(RecordingDecryptor::new());
        let proxy = topology
            .proxy
            .cache(&proxy_definition("missing"), &EncryptedInput::new())
            .unwrap();

        let err = proxy.decrypt(false).await.unwrap_err();
        assert!(err.to_string().contains("Cache not found: vault/missing"));
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;
    use vault_cache::state::{FileStateStore, SlotKey, StateStore};

    fn vault_cache(temp: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("vault-cache");
        cmd.env("VAULT_CACHE_CONFIG", temp.join("config.toml"))
            .env("VAULT_CACHE_STATE_DIR", temp.join("state"))
            .env("CI", "1");
        cmd
    }

    const SLOT: [&str; 6] = ["-a", "vault", "-n", "ciphers", "-u", "u1"];

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        vault_cache(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("persisted decrypted-record caches"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        vault_cache(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("vault-cache"));
    }

    #[test]
    fn config_path_honours_env() {
        let temp = TempDir::new().unwrap();
        vault_cache(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_prints_defaults() {
        let temp = TempDir::new().unwrap();
        vault_cache(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("cleanup_delay_ms = 1000"));
    }

    #[test]
    fn config_init_writes_file_once() {
        let temp = TempDir::new().unwrap();
        vault_cache(temp.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(temp.path().join("config.toml").exists());

        vault_cache(temp.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));
    }

    #[test]
    fn invalid_config_reports_hint() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[cache\n").unwrap();
        vault_cache(temp.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn state_show_on_empty_store_reads_cleared() {
        let temp = TempDir::new().unwrap();
        vault_cache(temp.path())
            .args(["state", "show"])
            .args(SLOT)
            .assert()
            .success()
            .stdout(predicate::str::contains("status: cleared"))
            .stdout(predicate::str::contains("records: none"));
    }

    #[test]
    fn state_show_rejects_reserved_name() {
        let temp = TempDir::new().unwrap();
        vault_cache(temp.path())
            .args(["state", "show", "-a", "vault", "-n", "ciphers_status", "-u", "u1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid cache key"));
    }

    #[tokio::test]
    async fn state_show_and_clear_persisted_cache() {
        let temp = TempDir::new().unwrap();
        {
            let store = FileStateStore::open(temp.path().join("state")).await.unwrap();
            store
                .update(
                    &SlotKey::new("vault", "u1", "ciphers"),
                    Some(json!({
                        "a": {"id": "a", "revision": 1, "text": "ALPHA"},
                        "b": {"id": "b", "revision": 1, "text": "BRAVO"}
                    })),
                )
                .await
                .unwrap();
            store
                .update(
                    &SlotKey::new("vault", "u1", "ciphers_status"),
                    Some(json!("complete")),
                )
                .await
                .unwrap();
        }

        vault_cache(temp.path())
            .args(["state", "show"])
            .args(SLOT)
            .assert()
            .success()
            .stdout(predicate::str::contains("status: complete"))
            .stdout(predicate::str::contains("records: 2"));

        vault_cache(temp.path())
            .args(["state", "show", "--json"])
            .args(SLOT)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"BRAVO\""));

        vault_cache(temp.path())
            .args(["state", "clear"])
            .args(SLOT)
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache cleared"));

        vault_cache(temp.path())
            .args(["state", "show"])
            .args(SLOT)
            .assert()
            .success()
            .stdout(predicate::str::contains("status: cleared"))
            .stdout(predicate::str::contains("revision: 2"));

        let store = FileStateStore::open(temp.path().join("state")).await.unwrap();
        let value = store
            .get(&SlotKey::new("vault", "u1", "ciphers"))
            .await
            .unwrap();
        assert!(value.value.is_none());
    }
}

//! Test utilities for the relay crate.
//!
//! This module provides shared helpers for both unit tests (in `src/`) and
//! integration tests (in `tests/`). It is compiled for unit tests and when
//! the `test-support` feature is enabled.

mod checkup;

pub use checkup::{MutableClock, RecordingSleeper};

pub mod provider {
    //! Scripted telemetry provider with call counters.

    use std::collections::BTreeMap;
    use std::sync::{Mutex, MutexGuard};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::domain::ports::{
        AccessGrant, TelemetryProvider, TelemetryProviderError, TelemetrySnapshot,
    };

    type Answers<T> = BTreeMap<String, Result<T, TelemetryProviderError>>;
    type Scripted<T> = Mutex<Answers<T>>;

    /// Provider answering from canned responses keyed by code and token.
    ///
    /// Unknown codes and tokens are rejected the way the real provider
    /// rejects them.
    ///
    /// # Examples
    /// ```
    /// use telemetry_relay::test_support::provider::ScriptedProvider;
    ///
    /// let provider = ScriptedProvider::new().with_grant("abc", "token-1");
    /// assert_eq!(provider.exchange_calls(), 0);
    /// ```
    #[derive(Default)]
    pub struct ScriptedProvider {
        grants: Scripted<AccessGrant>,
        snapshots: Scripted<TelemetrySnapshot>,
        exchange_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Accept `code`, answering with `access_token`.
        #[must_use]
        pub fn with_grant(self, code: &str, access_token: &str) -> Self {
            let grant = AccessGrant {
                access_token: access_token.to_owned(),
                expires_in: 315_360_000,
            };
            lock(&self.grants).insert(code.to_owned(), Ok(grant));
            self
        }

        /// Answer snapshot requests for `access_token` with `snapshot`.
        #[must_use]
        pub fn with_snapshot(self, access_token: &str, snapshot: TelemetrySnapshot) -> Self {
            self.set_snapshot(access_token, Ok(snapshot));
            self
        }

        /// Fail snapshot requests for `access_token` with `error`.
        #[must_use]
        pub fn with_snapshot_error(self, access_token: &str, error: TelemetryProviderError) -> Self {
            self.set_snapshot(access_token, Err(error));
            self
        }

        /// Replace the scripted snapshot answer for `access_token`.
        pub fn set_snapshot(
            &self,
            access_token: &str,
            answer: Result<TelemetrySnapshot, TelemetryProviderError>,
        ) {
            lock(&self.snapshots).insert(access_token.to_owned(), answer);
        }

        pub fn exchange_calls(&self) -> usize {
            self.exchange_calls.load(Ordering::SeqCst)
        }

        pub fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    fn lock<T>(scripted: &Scripted<T>) -> MutexGuard<'_, Answers<T>> {
        match scripted.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("scripted provider mutex"),
        }
    }

    #[async_trait]
    impl TelemetryProvider for ScriptedProvider {
        async fn exchange_code(&self, code: &str) -> Result<AccessGrant, TelemetryProviderError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.grants).get(code).cloned().unwrap_or_else(|| {
                Err(TelemetryProviderError::rejected(
                    "unable to get access token: 400 Bad Request",
                ))
            })
        }

        async fn fetch_snapshot(
            &self,
            access_token: &str,
        ) -> Result<TelemetrySnapshot, TelemetryProviderError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.snapshots)
                .get(access_token)
                .cloned()
                .unwrap_or_else(|| {
                    Err(TelemetryProviderError::rejected(
                        "unable to get metadata: 401 Unauthorized: ",
                    ))
                })
        }
    }
}

pub mod store {
    //! Document store wrapper that fails chosen writes.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::domain::ports::{ConditionalWrite, DocumentStore, DocumentStoreError, Precondition};
    use crate::domain::{CollectionPath, Document, DocumentPath};

    /// Delegates to `inner` but rejects `set` calls under `fail_prefix`.
    ///
    /// Every call is counted so tests can assert that no store access
    /// happened at all.
    pub struct FailingWrites {
        inner: Arc<dyn DocumentStore>,
        fail_prefix: Option<String>,
        calls: AtomicUsize,
    }

    impl FailingWrites {
        /// Wrap `inner` without failing anything yet.
        pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
            Self {
                inner,
                fail_prefix: None,
                calls: AtomicUsize::new(0),
            }
        }

        /// Fail every `set` whose path starts with `prefix`.
        #[must_use]
        pub fn failing_under(mut self, prefix: &str) -> Self {
            self.fail_prefix = Some(prefix.to_owned());
            self
        }

        /// Number of store operations attempted so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn count(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DocumentStore for FailingWrites {
        async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, DocumentStoreError> {
            self.count();
            self.inner.get(path).await
        }

        async fn set(
            &self,
            path: &DocumentPath,
            document: Document,
        ) -> Result<(), DocumentStoreError> {
            self.count();
            let rendered = path.to_string();
            let refused = self
                .fail_prefix
                .as_deref()
                .is_some_and(|prefix| rendered.starts_with(prefix));
            if refused {
                return Err(DocumentStoreError::unavailable(format!(
                    "write to {rendered} refused"
                )));
            }
            self.inner.set(path, document).await
        }

        async fn add(
            &self,
            collection: &CollectionPath,
            document: Document,
        ) -> Result<String, DocumentStoreError> {
            self.count();
            self.inner.add(collection, document).await
        }

        async fn list(
            &self,
            collection: &CollectionPath,
        ) -> Result<Vec<(String, Document)>, DocumentStoreError> {
            self.count();
            self.inner.list(collection).await
        }

        async fn update_if(
            &self,
            path: &DocumentPath,
            precondition: &Precondition,
            changes: Document,
        ) -> Result<ConditionalWrite, DocumentStoreError> {
            self.count();
            self.inner.update_if(path, precondition, changes).await
        }
    }
}

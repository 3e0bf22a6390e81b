// Async facade: one uniform asynchronous surface over the synchronous
// core.
//
// Every call hops through `spawn_blocking`, so driver work (rusqlite is
// blocking by nature) never stalls the async executor, and the whole
// synchronous operation — including the ingest critical section — runs
// without a suspension point inside it.

use std::sync::Arc;

use anyhow::anyhow;
use driftwood_common::document::{AuthorKeypair, Document};
use driftwood_common::query::Query;
use tokio::task;

use crate::error::{StoreError, WriteOutcome};
use crate::events::{DocumentWriteEvent, ListenerId};
use crate::store::{CloseOptions, DocToSet, Store};

#[derive(Clone)]
pub struct AsyncStore {
    store: Arc<Store>,
}

impl AsyncStore {
    pub fn new(store: Store) -> Self {
        Self { store: Arc::new(store) }
    }

    pub fn from_arc(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// The synchronous core, for callers that need to mix surfaces.
    pub fn as_sync(&self) -> &Arc<Store> {
        &self.store
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || op(&store))
            .await
            .map_err(|err| StoreError::Backend(anyhow!("storage task failed: {err}")))?
    }

    pub fn workspace(&self) -> &str {
        self.store.workspace()
    }

    pub async fn authors(&self) -> Result<Vec<String>, StoreError> {
        self.run(|store| store.authors()).await
    }

    pub async fn paths(&self, query: Query) -> Result<Vec<String>, StoreError> {
        self.run(move |store| store.paths(&query)).await
    }

    pub async fn documents(&self, query: Query) -> Result<Vec<Document>, StoreError> {
        self.run(move |store| store.documents(&query)).await
    }

    pub async fn contents(&self, query: Query) -> Result<Vec<String>, StoreError> {
        self.run(move |store| store.contents(&query)).await
    }

    pub async fn get_document(&self, path: String) -> Result<Option<Document>, StoreError> {
        self.run(move |store| store.get_document(&path)).await
    }

    pub async fn get_content(&self, path: String) -> Result<Option<String>, StoreError> {
        self.run(move |store| store.get_content(&path)).await
    }

    pub async fn ingest_document(
        &self,
        doc: Document,
        is_local: bool,
    ) -> Result<WriteOutcome, StoreError> {
        self.run(move |store| store.ingest_document(doc, is_local)).await
    }

    pub async fn set(
        &self,
        keypair: AuthorKeypair,
        input: DocToSet,
    ) -> Result<WriteOutcome, StoreError> {
        self.run(move |store| store.set(&keypair, input)).await
    }

    pub async fn remove_expired_documents(&self) -> Result<usize, StoreError> {
        self.run(|store| store.remove_expired_documents()).await
    }

    pub async fn set_config(&self, key: String, value: String) -> Result<(), StoreError> {
        self.run(move |store| store.set_config(&key, &value)).await
    }

    pub async fn get_config(&self, key: String) -> Result<Option<String>, StoreError> {
        self.run(move |store| store.get_config(&key)).await
    }

    pub async fn delete_config(&self, key: String) -> Result<bool, StoreError> {
        self.run(move |store| store.delete_config(&key)).await
    }

    pub async fn delete_all_config(&self) -> Result<(), StoreError> {
        self.run(|store| store.delete_all_config()).await
    }

    /// Listener registration stays synchronous: it only touches the
    /// in-process registry, never the driver.
    pub fn on_write<F>(&self, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(&DocumentWriteEvent) + Send + 'static,
    {
        self.store.on_write(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<bool, StoreError> {
        self.store.remove_listener(id)
    }

    pub async fn close(&self, options: CloseOptions) -> Result<(), StoreError> {
        self.run(move |store| store.close(options)).await
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

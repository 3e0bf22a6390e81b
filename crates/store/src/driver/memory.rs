// In-memory driver: two-level map `path → author → document`.
//
// Documents are stored behind `Arc` once written and never mutated;
// queries return owned clones. Suits tests and throwaway workspaces.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use driftwood_common::document::Document;
use driftwood_common::query::{finish_query, Query};

use crate::driver::StorageDriver;

#[derive(Default)]
pub struct MemoryDriver {
    workspace: Option<String>,
    docs: BTreeMap<String, BTreeMap<String, Arc<Document>>>,
    config: BTreeMap<String, String>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_docs_at_path(slots: &BTreeMap<String, Arc<Document>>, now: i64) -> Vec<Document> {
        slots
            .values()
            .filter(|doc| !doc.is_expired(now))
            .map(|doc| doc.as_ref().clone())
            .collect()
    }
}

impl StorageDriver for MemoryDriver {
    fn begin(&mut self, workspace: &str, _now: i64) -> Result<()> {
        self.workspace = Some(workspace.to_string());
        Ok(())
    }

    fn authors(&mut self, now: i64) -> Result<Vec<String>> {
        let mut authors: Vec<String> = self
            .docs
            .values()
            .flat_map(|slots| slots.values())
            .filter(|doc| !doc.is_expired(now))
            .map(|doc| doc.author.clone())
            .collect();
        authors.sort();
        authors.dedup();
        Ok(authors)
    }

    fn query_documents(&mut self, query: &Query, now: i64) -> Result<Vec<Document>> {
        let clean = query.clean_up();
        if clean.matches_nothing {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        match &clean.query.path {
            Some(path) => {
                if let Some(slots) = self.docs.get(path) {
                    candidates.extend(Self::live_docs_at_path(slots, now));
                }
            }
            None => {
                for (path, slots) in &self.docs {
                    if let Some(prefix) = &clean.query.path_prefix {
                        if !path.starts_with(prefix.as_str()) {
                            continue;
                        }
                    }
                    candidates.extend(Self::live_docs_at_path(slots, now));
                }
            }
        }

        Ok(finish_query(candidates, &clean))
    }

    fn upsert_document(&mut self, doc: Document) -> Result<()> {
        self.docs
            .entry(doc.path.clone())
            .or_default()
            .insert(doc.author.clone(), Arc::new(doc));
        Ok(())
    }

    fn remove_expired_documents(&mut self, now: i64) -> Result<usize> {
        let mut removed = 0;
        self.docs.retain(|_, slots| {
            slots.retain(|_, doc| {
                let expired = doc.is_expired(now);
                if expired {
                    removed += 1;
                }
                !expired
            });
            !slots.is_empty()
        });
        Ok(removed)
    }

    fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.config.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_config(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.config.get(key).cloned())
    }

    fn delete_config(&mut self, key: &str) -> Result<bool> {
        Ok(self.config.remove(key).is_some())
    }

    fn delete_all_config(&mut self) -> Result<()> {
        self.config.clear();
        Ok(())
    }

    fn close(&mut self, delete: bool) -> Result<()> {
        if delete {
            self.docs.clear();
            self.config.clear();
        }
        Ok(())
    }
}

use crate::domain::ports::HostDocumentRef;
use crate::error::{CheckoutError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// Makes sure a checkout script is present in the document exactly once.
///
/// Keeps a registry of script ids. Concurrent callers asking for the same id
/// share one load; a failed load leaves the entry empty so a later attempt
/// can retry.
pub struct ScriptLoader {
    document: HostDocumentRef,
    registry: Mutex<HashMap<String, Arc<OnceCell<()>>>>,
}

impl ScriptLoader {
    pub fn new(document: HostDocumentRef) -> Self {
        Self {
            document,
            registry: Mutex::new(HashMap::new()),
        }
    }

    pub async fn ensure_loaded(&self, script_id: &str, script_url: &str) -> Result<()> {
        let cell = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(script_id.to_string())
            .or_default()
            .clone();

        cell.get_or_try_init(|| self.inject(script_id, script_url))
            .await
            .map(|_| ())
    }

    pub fn is_loaded(&self, script_id: &str) -> bool {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(script_id)
            .is_some_and(|cell| cell.initialized())
    }

    async fn inject(&self, script_id: &str, script_url: &str) -> Result<()> {
        if self.document.has_script(script_id) {
            tracing::debug!(script_id, "checkout script already present");
            return Ok(());
        }

        tracing::info!(script_id, script_url, "injecting checkout script");
        match self.document.load_script(script_id, script_url).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.document.remove_script(script_id);
                tracing::error!(script_id, error = %err, "checkout script failed to load");
                Err(match err {
                    CheckoutError::ScriptLoad { .. } => err,
                    other => CheckoutError::ScriptLoad {
                        script_id: script_id.to_string(),
                        reason: other.to_string(),
                    },
                })
            }
        }
    }
}

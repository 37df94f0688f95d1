//! Parameter namespace promotion.
//!
//! The `latest` segment of `/service/stage/latest/` is the human-editable
//! source of truth; numbered segments are immutable snapshots copied from it
//! at release time.

use std::collections::BTreeSet;

use tracing::info;

use crate::error::{ReleaseError, Result};
use crate::provider::{ParameterOps, StoredParameter};

/// Path of the editable configuration namespace for a service and stage.
#[must_use]
pub fn latest_path(service: &str, stage: &str) -> String {
    format!("/{service}/{stage}/latest/")
}

/// Path of a version-qualified configuration namespace.
#[must_use]
pub fn version_path(service: &str, stage: &str, version: u32) -> String {
    format!("/{service}/{stage}/{version}/")
}

/// Copies the `latest` configuration namespace to a version-qualified path.
pub struct ParameterPromoter<'a> {
    /// Parameter store.
    parameters: &'a dyn ParameterOps,
}

impl<'a> ParameterPromoter<'a> {
    /// Creates a promoter.
    #[must_use]
    pub const fn new(parameters: &'a dyn ParameterOps) -> Self {
        Self { parameters }
    }

    /// Promotes all parameters under `latest` to `target_version`.
    ///
    /// Completeness is validated first: every name in `required` must already
    /// exist under `latest`, otherwise the promotion fails naming the missing
    /// keys before a single write is issued. Copies overwrite, so re-running
    /// after a partial failure converges instead of erroring.
    ///
    /// Returns the number of parameters copied.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::MissingParameters`] when required keys are
    /// absent, or any parameter store failure.
    pub async fn promote(
        &self,
        service: &str,
        stage: &str,
        target_version: u32,
        required: &BTreeSet<String>,
    ) -> Result<usize> {
        let source = latest_path(service, stage);
        let destination = version_path(service, stage, target_version);

        let stored = self.list_all(&source).await?;

        let present: BTreeSet<String> = stored
            .iter()
            .filter_map(|p| p.name.strip_prefix(&source).map(String::from))
            .collect();
        let missing: Vec<String> = required.difference(&present).cloned().collect();
        if !missing.is_empty() {
            return Err(ReleaseError::missing_parameters(&missing, service, stage).into());
        }

        for parameter in &stored {
            let Some(leaf) = parameter.name.strip_prefix(&source) else {
                continue;
            };
            let target = format!("{destination}{leaf}");
            info!("copying parameter {} to {target}", parameter.name);
            self.parameters
                .put_parameter(&target, &parameter.value, parameter.kind, true)
                .await?;
        }

        Ok(stored.len())
    }

    async fn list_all(&self, path: &str) -> Result<Vec<StoredParameter>> {
        let mut all = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .parameters
                .list_parameters(path, token.as_deref())
                .await?;
            all.extend(page.parameters);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StagehandError;
    use crate::provider::memory::InMemoryParameters;
    use crate::provider::ParameterKind;

    fn required(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    fn seeded_store() -> InMemoryParameters {
        let store = InMemoryParameters::new();
        store.insert("/billing/dev/latest/DB_HOST", "db.internal", ParameterKind::Plain);
        store.insert("/billing/dev/latest/DB_PASS", "hunter2", ParameterKind::Secret);
        store
    }

    #[tokio::test]
    async fn test_promote_copies_all_keys_preserving_kind() {
        let store = seeded_store();
        let promoter = ParameterPromoter::new(&store);

        let copied = promoter
            .promote("billing", "dev", 3, &required(&["DB_HOST", "DB_PASS"]))
            .await
            .unwrap();

        assert_eq!(copied, 2);
        let pass = store.get("/billing/dev/3/DB_PASS").unwrap();
        assert_eq!(pass.value, "hunter2");
        assert_eq!(pass.kind, ParameterKind::Secret);
        let host = store.get("/billing/dev/3/DB_HOST").unwrap();
        assert_eq!(host.kind, ParameterKind::Plain);
    }

    #[tokio::test]
    async fn test_promote_is_idempotent() {
        let store = seeded_store();
        let promoter = ParameterPromoter::new(&store);
        let keys = required(&["DB_HOST", "DB_PASS"]);

        let first = promoter.promote("billing", "dev", 3, &keys).await.unwrap();
        let snapshot = store.under("/billing/dev/3/");

        let second = promoter.promote("billing", "dev", 3, &keys).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.under("/billing/dev/3/"), snapshot);
    }

    #[tokio::test]
    async fn test_missing_required_key_fails_before_any_write() {
        let store = InMemoryParameters::new();
        store.insert("/billing/dev/latest/DB_HOST", "db.internal", ParameterKind::Plain);

        let promoter = ParameterPromoter::new(&store);
        let err = promoter
            .promote("billing", "dev", 3, &required(&["DB_HOST", "DB_PASS"]))
            .await
            .unwrap_err();

        match err {
            StagehandError::Release(ReleaseError::MissingParameters { missing, .. }) => {
                assert_eq!(missing, "DB_PASS");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_promote_drains_every_page_of_latest() {
        let store = InMemoryParameters::new();
        for i in 0..25 {
            store.insert(
                format!("/billing/dev/latest/KEY_{i:02}"),
                "v",
                ParameterKind::Plain,
            );
        }
        store.set_page_size(4);

        let promoter = ParameterPromoter::new(&store);
        let copied = promoter
            .promote("billing", "dev", 1, &BTreeSet::new())
            .await
            .unwrap();

        assert_eq!(copied, 25);
        assert_eq!(store.under("/billing/dev/1/").len(), 25);
    }
}

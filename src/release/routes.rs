//! Idempotent reconciliation of API base-path mappings.

use tracing::{info, warn};

use crate::error::Result;
use crate::provider::{RouteMapping, RouteOps, EMPTY_BASE_PATH_SENTINEL};

/// Result of a route reconciliation — a three-way state determination, not a
/// blind write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No custom domain is configured for this stage; mapping skipped.
    SkippedNoDomain,
    /// The mapping did not exist and was created.
    Created,
    /// The mapping already points at the desired target.
    AlreadyCorrect,
    /// The mapping exists but points elsewhere, and the control plane offers
    /// no way to update it in place.
    ManualInterventionRequired {
        /// The mapping currently in place.
        existing: RouteMapping,
    },
}

/// Reconciles a desired base-path mapping against the remote state.
pub struct RouteReconciler<'a> {
    /// Routing control plane.
    routes: &'a dyn RouteOps,
}

impl<'a> RouteReconciler<'a> {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(routes: &'a dyn RouteOps) -> Self {
        Self { routes }
    }

    /// Ensures `(domain, base_path)` maps to `(backend_id, stage)`.
    ///
    /// An empty `domain` means no custom domain is configured and the step is
    /// skipped. A `base_path` of `/` is the root and is normalized to the
    /// empty string before comparison; the control plane reports the root as
    /// a literal `(none)` sentinel, which is translated back likewise.
    ///
    /// # Errors
    ///
    /// Returns an error if a control plane call fails. Divergent mappings are
    /// not an error; they surface as
    /// [`RouteOutcome::ManualInterventionRequired`].
    pub async fn reconcile(
        &self,
        domain: &str,
        base_path: &str,
        backend_id: &str,
        stage: &str,
    ) -> Result<RouteOutcome> {
        if domain.is_empty() {
            info!("domain name is empty, skipping base path mapping");
            return Ok(RouteOutcome::SkippedNoDomain);
        }

        let desired_path = normalize_base_path(base_path);

        let mappings = self.routes.list_mappings(domain).await?;
        let existing = mappings
            .into_iter()
            .find(|m| normalize_base_path(&m.base_path) == desired_path);

        match existing {
            None => {
                let mapping = RouteMapping {
                    base_path: desired_path.clone(),
                    backend_id: backend_id.to_string(),
                    stage: stage.to_string(),
                };
                self.routes.create_mapping(domain, &mapping).await?;
                info!(
                    "created base path mapping of {domain}/{desired_path} to \
                     {backend_id}:{stage}"
                );
                Ok(RouteOutcome::Created)
            }
            Some(current) if current.backend_id == backend_id && current.stage == stage => {
                info!("base path mapping already in place, no update needed");
                Ok(RouteOutcome::AlreadyCorrect)
            }
            Some(current) => {
                warn!(
                    "base path mapping for {domain}/{desired_path} has to be \
                     updated, but that action cannot be performed via the API; \
                     update it in the provider console"
                );
                Ok(RouteOutcome::ManualInterventionRequired { existing: current })
            }
        }
    }
}

/// Normalizes a base path for comparison: the root may be spelled `/`, the
/// empty string, or the provider's read-side `(none)` sentinel.
fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed == "/" || trimmed == EMPTY_BASE_PATH_SENTINEL {
        String::new()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::InMemoryRoutes;

    fn stored_root_mapping(backend_id: &str, stage: &str) -> RouteMapping {
        RouteMapping {
            // The provider reports the root mapping with its sentinel.
            base_path: String::from("(none)"),
            backend_id: backend_id.to_string(),
            stage: stage.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_domain_skips_without_error() {
        let routes = InMemoryRoutes::new();
        let outcome = RouteReconciler::new(&routes)
            .reconcile("", "/", "api123", "dev")
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::SkippedNoDomain);
        assert_eq!(routes.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_mapping_is_created() {
        let routes = InMemoryRoutes::new();
        let outcome = RouteReconciler::new(&routes)
            .reconcile("api.example.com", "billing", "api123", "dev")
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::Created);
        let mappings = routes.mappings("api.example.com");
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].base_path, "billing");
    }

    #[tokio::test]
    async fn test_slash_and_empty_input_match_stored_sentinel() {
        for input in ["/", ""] {
            let routes = InMemoryRoutes::new();
            routes.insert_mapping("api.example.com", stored_root_mapping("api123", "dev"));

            let outcome = RouteReconciler::new(&routes)
                .reconcile("api.example.com", input, "api123", "dev")
                .await
                .unwrap();

            assert_eq!(outcome, RouteOutcome::AlreadyCorrect, "input {input:?}");
            assert_eq!(routes.create_calls(), 0, "input {input:?}");
        }
    }

    #[tokio::test]
    async fn test_divergent_mapping_needs_manual_intervention() {
        let routes = InMemoryRoutes::new();
        routes.insert_mapping("api.example.com", stored_root_mapping("other999", "prod"));

        let outcome = RouteReconciler::new(&routes)
            .reconcile("api.example.com", "/", "api123", "dev")
            .await
            .unwrap();

        match outcome {
            RouteOutcome::ManualInterventionRequired { existing } => {
                assert_eq!(existing.backend_id, "other999");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // No unsupported in-place update was attempted.
        assert_eq!(routes.create_calls(), 0);
        assert_eq!(routes.mappings("api.example.com").len(), 1);
    }
}

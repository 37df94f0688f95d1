//! Monotonic version allocation for function releases.

use tracing::{debug, info};

use crate::error::Result;
use crate::provider::{FunctionOps, UNPUBLISHED_VERSION_LABEL};

/// Computes the next release version for a named function.
pub struct VersionLedger<'a> {
    /// Function control plane.
    functions: &'a dyn FunctionOps,
}

impl<'a> VersionLedger<'a> {
    /// Creates a ledger.
    #[must_use]
    pub const fn new(functions: &'a dyn FunctionOps) -> Self {
        Self { functions }
    }

    /// Returns the smallest unused version greater than every version this
    /// function has ever published, or 1 if none exist.
    ///
    /// The paginated listing is fully drained before the answer is computed;
    /// deciding on a partial page would undercount the maximum. The reserved
    /// unpublished marker is excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the version listing fails.
    pub async fn next_version(&self, function_name: &str) -> Result<u32> {
        let mut highest: u32 = 0;
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .functions
                .list_versions(function_name, marker.as_deref())
                .await?;

            for label in &page.versions {
                if label == UNPUBLISHED_VERSION_LABEL {
                    continue;
                }
                match label.parse::<u32>() {
                    Ok(number) => highest = highest.max(number),
                    Err(_) => debug!("skipping unparsable version label \"{label}\""),
                }
            }

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        let next = highest + 1;
        info!("new version for function \"{function_name}\" will be {next}");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::InMemoryFunctions;

    #[tokio::test]
    async fn test_first_version_is_one() {
        let functions = InMemoryFunctions::new();
        let ledger = VersionLedger::new(&functions);

        assert_eq!(ledger.next_version("billing-api").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_next_version_is_max_plus_one_not_gap_filling() {
        let functions = InMemoryFunctions::new();
        functions.seed_versions(&[1, 2, 5]);

        let ledger = VersionLedger::new(&functions);
        assert_eq!(ledger.next_version("billing-api").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_all_pages_are_drained_before_deciding() {
        let functions = InMemoryFunctions::new();
        functions.seed_versions(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        // Tiny pages: the maximum lives on the last page.
        functions.set_page_size(2);

        let ledger = VersionLedger::new(&functions);
        assert_eq!(ledger.next_version("billing-api").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_unpublished_marker_is_excluded() {
        let functions = InMemoryFunctions::new();
        // The fake always lists the mutable head first; with no published
        // versions the marker is all there is.
        functions.seed_versions(&[]);

        let ledger = VersionLedger::new(&functions);
        assert_eq!(ledger.next_version("billing-api").await.unwrap(), 1);
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use super::{GcError, Reclaimer, RunContext};
use crate::db::BuildRepo;

/// Marks finished builds as no longer interceptible.
///
/// Only the latest build of a job that did not succeed stays
/// interceptible, so its containers survive for debugging. Containers of
/// every other finished build become orphans.
pub struct BuildCollector {
    repo: Arc<dyn BuildRepo>,
}

impl BuildCollector {
    pub fn new(repo: Arc<dyn BuildRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Reclaimer for BuildCollector {
    fn name(&self) -> &'static str {
        "builds"
    }

    async fn run(&self, _ctx: &RunContext) -> Result<(), GcError> {
        let marked = self.repo.mark_non_interceptible().await?;
        if marked > 0 {
            tracing::debug!(marked, "Marked finished builds non-interceptible");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::gc::testing::FakeBuildStore;

    #[tokio::test]
    async fn test_marks_builds() {
        let store = Arc::new(FakeBuildStore::default());

        BuildCollector::new(store.clone())
            .run(&RunContext::new(CancellationToken::new()))
            .await
            .unwrap();

        assert_eq!(*store.non_interceptible.lock(), 1);
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let store = Arc::new(FakeBuildStore::default());
        store.failures.fail("mark_non_interceptible");

        let result = BuildCollector::new(store)
            .run(&RunContext::new(CancellationToken::new()))
            .await;

        assert!(matches!(result, Err(GcError::Db(_))));
    }
}

//! Warehouse-backed `IdentityProvider` adapter.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use super::client::{Statement, StatementError, StatementExecutor};
use crate::domain::Identity;
use crate::domain::ports::{IdentityProvider, IdentityProviderError};

const CURRENT_USER_SQL: &str = "SELECT current_user()";

/// Resolves `current_user()` once and reuses it for the process lifetime.
pub struct WarehouseIdentityProvider<E> {
    executor: Arc<E>,
    resolved: OnceCell<Identity>,
}

impl<E> WarehouseIdentityProvider<E> {
    /// Create a provider over `executor`.
    pub fn new(executor: Arc<E>) -> Self {
        Self {
            executor,
            resolved: OnceCell::new(),
        }
    }
}

impl<E> WarehouseIdentityProvider<E>
where
    E: StatementExecutor,
{
    async fn lookup(&self) -> Result<Identity, IdentityProviderError> {
        let result = self
            .executor
            .execute(&Statement::new(CURRENT_USER_SQL))
            .await
            .map_err(map_statement_error)?;
        let raw = result
            .rows()
            .first()
            .and_then(|row| row.first())
            .and_then(|cell| cell.as_deref())
            .ok_or_else(|| IdentityProviderError::unresolved("current_user() returned no rows"))?;
        let identity = Identity::new(raw)
            .map_err(|error| IdentityProviderError::unresolved(error.to_string()))?;
        info!(identity = %identity, "resolved warehouse identity");
        Ok(identity)
    }
}

fn map_statement_error(error: StatementError) -> IdentityProviderError {
    match error {
        StatementError::Failed { .. }
        | StatementError::Rejected { .. }
        | StatementError::Decode { .. } => IdentityProviderError::unresolved(error.to_string()),
        _ => IdentityProviderError::connection(error.to_string()),
    }
}

#[async_trait]
impl<E> IdentityProvider for WarehouseIdentityProvider<E>
where
    E: StatementExecutor,
{
    async fn current_identity(&self) -> Result<Identity, IdentityProviderError> {
        self.resolved
            .get_or_try_init(|| self.lookup())
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::warehouse::StatementResult;
    use crate::outbound::warehouse::client::MockStatementExecutor;

    fn single_cell(value: Option<&str>) -> StatementResult {
        StatementResult::new(
            vec!["current_user()".to_owned()],
            vec![vec![value.map(str::to_owned)]],
        )
    }

    #[tokio::test]
    async fn resolves_and_caches_current_user() {
        let mut executor = MockStatementExecutor::new();
        executor
            .expect_execute()
            .withf(|statement| statement.sql() == CURRENT_USER_SQL)
            .times(1)
            .returning(|_| Ok(single_cell(Some("svc@example.com"))));
        let provider = WarehouseIdentityProvider::new(Arc::new(executor));

        for _ in 0..2 {
            let identity = provider.current_identity().await.expect("identity");
            assert_eq!(identity.as_str(), "svc@example.com");
        }
    }

    #[tokio::test]
    async fn null_user_is_unresolved() {
        let mut executor = MockStatementExecutor::new();
        executor
            .expect_execute()
            .returning(|_| Ok(single_cell(None)));
        let provider = WarehouseIdentityProvider::new(Arc::new(executor));

        let error = provider.current_identity().await.expect_err("unresolved");
        assert!(matches!(error, IdentityProviderError::Unresolved { .. }));
    }

    #[tokio::test]
    async fn unreachable_warehouse_is_a_connection_error() {
        let mut executor = MockStatementExecutor::new();
        executor
            .expect_execute()
            .returning(|_| Err(StatementError::unavailable("connection refused")));
        let provider = WarehouseIdentityProvider::new(Arc::new(executor));

        let error = provider.current_identity().await.expect_err("connection");
        assert!(matches!(error, IdentityProviderError::Connection { .. }));
    }
}

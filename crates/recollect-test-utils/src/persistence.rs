use recollect_memory::{Fetch, PersistenceError, PersistenceGateway, QueryOutput, SqlValue};
use std::sync::Arc;

/// Persistence gateway that refuses statements.
///
/// Without an inner gateway every statement fails. With one, only statements
/// containing the configured fragment fail and the rest are forwarded.
#[derive(Clone, Default)]
pub struct FailingPersistence {
    inner: Option<Arc<dyn PersistenceGateway>>,
    fragment: Option<String>,
}

impl FailingPersistence {
    pub fn always() -> Self {
        Self::default()
    }

    /// Fail statements containing `fragment`, forward everything else to `inner`.
    pub fn on(fragment: impl Into<String>, inner: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            inner: Some(inner),
            fragment: Some(fragment.into()),
        }
    }
}

impl PersistenceGateway for FailingPersistence {
    fn execute(
        &self,
        statement: &str,
        params: &[SqlValue],
        fetch: Fetch,
    ) -> Result<QueryOutput, PersistenceError> {
        let refused = self
            .fragment
            .as_deref()
            .is_none_or(|fragment| statement.contains(fragment));
        match (&self.inner, refused) {
            (Some(inner), false) => inner.execute(statement, params, fetch),
            _ => Err(PersistenceError::Unavailable(
                "statement refused by test gateway".to_string(),
            )),
        }
    }
}

use std::future::Future;

use futures_util::future::try_join_all;
use tracing::warn;

use crate::error::ServiceError;

/// Resolve every lookup concurrently. Lookups that come back `None` are
/// dropped; the survivors keep their input order. The first hard error
/// aborts the whole gather.
pub async fn gather<I, F, T>(lookups: I) -> Result<Vec<T>, ServiceError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<Option<T>, ServiceError>>,
{
    let resolved = try_join_all(lookups).await?;
    Ok(resolved.into_iter().flatten().collect())
}

/// Turn a dangling reference or an undecodable record into a skipped list
/// item. Anything else is still an error.
pub fn skip_unresolvable<T>(
    context: &str,
    result: Result<T, ServiceError>,
) -> Result<Option<T>, ServiceError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err @ (ServiceError::NotFound { .. } | ServiceError::Decode(_))) => {
            warn!("Skipping {}: {}", context, err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

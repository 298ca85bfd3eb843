use std::sync::Once;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::debug;

use crate::error::{Store, ValidatorError};

static INSTALL_DRIVERS: Once = Once::new();

/// Open a single-connection pool to one of the two stores.
///
/// The URL scheme picks the driver (`postgres:`, `sqlite:`). Each store gets
/// exactly one connection, reused for the whole run.
pub async fn connect(url: &str, store: Store) -> Result<AnyPool, ValidatorError> {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

    debug!("connecting to {} store", store);
    AnyPoolOptions::new()
        .max_connections(1)
        .connect(url)
        .await
        .map_err(|source| ValidatorError::Connectivity { store, source })
}

/// Read a text column that may be stored as text or as an integer.
pub(crate) fn text_or_integer(row: &sqlx::any::AnyRow, index: usize) -> Option<String> {
    use sqlx::Row;

    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value;
    }
    integer(row, index).map(|v| v.to_string())
}

/// Read an integer column of any width.
pub(crate) fn integer(row: &sqlx::any::AnyRow, index: usize) -> Option<i64> {
    use sqlx::Row;

    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value;
    }
    if let Ok(value) = row.try_get::<Option<i32>, _>(index) {
        return value.map(i64::from);
    }
    row.try_get::<Option<i16>, _>(index)
        .ok()
        .flatten()
        .map(i64::from)
}

mod config;
mod error;
mod listener;
mod store;

use crate::dao::storage::StorageError;

pub use config::SupabaseConfig;
pub use error::{SupabaseDaoError, SupabaseResult};
pub use listener::ChangeListener;
pub use store::SupabaseScoreStore;

impl From<SupabaseDaoError> for StorageError {
    fn from(err: SupabaseDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

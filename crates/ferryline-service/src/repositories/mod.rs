pub mod hosted;
pub mod sqlite;
pub mod traits;

pub use hosted::HostedStore;
pub use sqlite::SqliteStore;
pub use traits::{ContentStore, ListParams, Repository, SortOrder};

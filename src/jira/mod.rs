pub mod api_types;
mod cache;
pub mod cached_client;
pub mod client;
pub mod development;
pub mod fields;
pub mod jql;
pub mod types;

pub use api_types::Issue;
pub use cached_client::CachedJiraClient;
pub use fields::{FieldCatalog, FieldRoles};
pub use jql::IssueQuery;
pub use types::DateField;

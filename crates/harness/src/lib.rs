pub mod hooks;
pub mod site;
pub mod store;

pub use hooks::{SlugHook, ViewsLimit, WriteLog};
pub use site::{TestSite, article_schema, init_tracing};
pub use store::{CallCounts, CountingStore};

pub mod query_handlers;
pub mod render_handlers;
pub mod system_handlers;

pub use query_handlers::*;
pub use render_handlers::*;
pub use system_handlers::*;

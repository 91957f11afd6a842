mod config;
mod load;
mod query;
mod status;

pub use config::ConfigCommand;
pub use load::LoadArgs;
pub use query::QueryArgs;

pub use config::handle_config;
pub use load::handle_load;
pub use query::handle_query;
pub use status::handle_status;

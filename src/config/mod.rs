pub mod schema;

pub use schema::{
    default_config_path, default_data_dir, AuthConfig, BlogConfig, Config, GatewayConfig,
    StorageConfig,
};

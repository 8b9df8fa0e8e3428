//! Configuration Management
//!
//! Loads layered configuration from files and environment variables.

mod settings;

pub use settings::{
    ChatSettings, CorsSettings, DatabaseSettings, JwtSettings, ServerSettings, Settings,
    SnowflakeSettings, MIN_JWT_SECRET_LENGTH,
};

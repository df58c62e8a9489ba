//! Environment model
//!
//! Layered variable scopes, env file loading and `${VAR}` templating.

pub mod envfile;
pub mod model;
pub mod template;

pub use envfile::load_envfile;
pub use model::{EnvEntry, EnvValue, Environment, CONF_DIR_VAR};
pub use template::apply_envvars_to_template;

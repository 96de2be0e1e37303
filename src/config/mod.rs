//! Provider configuration.
//!
//! This module handles all configuration-related functionality:
//! - Parsing `skyforge.yaml` and `.env`
//! - Environment variable overrides
//! - Validation of endpoints and retry schedules

mod parser;
mod spec;
mod validator;

pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_ACCESS_TOKEN, ENV_KUBE_HOST, ENV_KUBE_TOKEN,
    ENV_PROJECT, ENV_REGION, find_config_file, user_config_file,
};
pub use spec::{
    DEFAULT_BIGTABLE_ADMIN_ENDPOINT, DEFAULT_COMPUTE_ENDPOINT, GoogleConfig, HttpConfig,
    KubernetesConfig, ProviderConfig, RetrySettings,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};

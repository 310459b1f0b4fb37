use crate::config::AlprConfig;

pub fn setup_logging(config: &AlprConfig) {
    common::setup_logging(config.environment);
}

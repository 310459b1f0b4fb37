use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    /// Reads `ENVIRONMENT`. Anything other than `production`/`prod` is development.
    pub fn from_env() -> Self {
        env::var("ENVIRONMENT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!(
                "{} is not a supported environment. Use either `development` or `production`.",
                other
            )),
        }
    }
}

/// Parse an environment variable, falling back to `default` when it is unset
/// or does not parse.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// String variant of [`env_or`]; empty values count as unset.
pub fn env_string_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Optional string variable; empty values count as unset.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn parses_environment_names() {
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!(
            " Production ".parse::<Environment>(),
            Ok(Environment::Production)
        );
        assert_eq!("dev".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    #[serial]
    fn unknown_environment_falls_back_to_development() {
        unsafe { env::set_var("ENVIRONMENT", "staging") };
        assert_eq!(Environment::from_env(), Environment::Development);

        unsafe { env::set_var("ENVIRONMENT", "prod") };
        assert_eq!(Environment::from_env(), Environment::Production);

        unsafe { env::remove_var("ENVIRONMENT") };
        assert_eq!(Environment::from_env(), Environment::Development);
    }

    #[test]
    #[serial]
    fn env_or_ignores_unparsable_values() {
        unsafe { env::set_var("COMMON_TEST_PORT", "not-a-number") };
        assert_eq!(env_or("COMMON_TEST_PORT", 1883u16), 1883);

        unsafe { env::set_var("COMMON_TEST_PORT", " 8883 ") };
        assert_eq!(env_or("COMMON_TEST_PORT", 1883u16), 8883);

        unsafe { env::remove_var("COMMON_TEST_PORT") };
        assert_eq!(env_or("COMMON_TEST_PORT", 1883u16), 1883);
    }

    #[test]
    #[serial]
    fn empty_strings_count_as_unset() {
        unsafe { env::set_var("COMMON_TEST_TOPIC", "  ") };
        assert_eq!(env_string_or("COMMON_TEST_TOPIC", "a/b"), "a/b");
        assert_eq!(env_opt("COMMON_TEST_TOPIC"), None);

        unsafe { env::set_var("COMMON_TEST_TOPIC", "c/d") };
        assert_eq!(env_string_or("COMMON_TEST_TOPIC", "a/b"), "c/d");
        assert_eq!(env_opt("COMMON_TEST_TOPIC").as_deref(), Some("c/d"));

        unsafe { env::remove_var("COMMON_TEST_TOPIC") };
    }
}

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[serde(alias = "dev")]
    Development,
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_deserialize() {
        let env: Environment = serde_json::from_str("\"prod\"").unwrap();
        assert_eq!(env, Environment::Production);
        assert_eq!(env.as_str(), "production");

        let env: Environment = serde_json::from_str("\"development\"").unwrap();
        assert_eq!(env, Environment::Development);
    }

    #[test]
    fn test_unknown_environment_rejected() {
        let result: Result<Environment, _> = serde_json::from_str("\"staging\"");
        assert!(result.is_err());
    }
}

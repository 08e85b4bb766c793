//! `init` parameters for the ledger contract.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// 0.01 XLM in stroops.
pub const DEFAULT_PRICE_PER_30D: i128 = 100_000;
/// 48 hours.
pub const DEFAULT_GRACE_SECONDS: u64 = 48 * 60 * 60;

pub const ENV_ADMIN: &str = "ADMIN";
pub const ENV_PAYMENT_TOKEN: &str = "PAYMENT_TOKEN";
pub const ENV_PRICE_PER_30D: &str = "PRICE_PER_30D";
pub const ENV_TREASURY: &str = "TREASURY";
pub const ENV_OPERATOR: &str = "OPERATOR";
pub const ENV_GRACE_SECONDS: &str = "GRACE_SECONDS";

const STRKEY_LEN: usize = 56;

/// Construction arguments for `LovepassGold::init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployParams {
    pub admin: String,
    pub payment_token: String,
    #[serde(default = "default_price")]
    pub price_per_30d: i128,
    pub treasury: String,
    /// Falls back to `admin` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default = "default_grace")]
    pub grace_seconds: u64,
}

fn default_price() -> i128 {
    DEFAULT_PRICE_PER_30D
}

fn default_grace() -> u64 {
    DEFAULT_GRACE_SECONDS
}

impl DeployParams {
    /// Resolve parameters through `lookup`, which maps a variable name to its
    /// value. `TREASURY`, `ADMIN` and `PAYMENT_TOKEN` are required.
    pub fn from_vars<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let treasury = get(ENV_TREASURY).ok_or(ConfigError::Missing(ENV_TREASURY))?;
        let admin = get(ENV_ADMIN).ok_or(ConfigError::Missing(ENV_ADMIN))?;
        let payment_token =
            get(ENV_PAYMENT_TOKEN).ok_or(ConfigError::Missing(ENV_PAYMENT_TOKEN))?;

        let price_per_30d = match get(ENV_PRICE_PER_30D) {
            Some(raw) => parse_number(ENV_PRICE_PER_30D, &raw)?,
            None => {
                tracing::debug!(price = DEFAULT_PRICE_PER_30D, "price not set, using default");
                DEFAULT_PRICE_PER_30D
            }
        };
        let grace_seconds = match get(ENV_GRACE_SECONDS) {
            Some(raw) => parse_number(ENV_GRACE_SECONDS, &raw)?,
            None => {
                tracing::debug!(grace = DEFAULT_GRACE_SECONDS, "grace not set, using default");
                DEFAULT_GRACE_SECONDS
            }
        };

        let params = Self {
            admin: admin.trim().to_string(),
            payment_token: payment_token.trim().to_string(),
            price_per_30d,
            treasury: treasury.trim().to_string(),
            operator: get(ENV_OPERATOR).map(|v| v.trim().to_string()),
            grace_seconds,
        };
        params.validate()?;

        tracing::info!(
            treasury = %params.treasury,
            operator = %params.operator(),
            price = params.price_per_30d,
            grace = params.grace_seconds,
            "resolved deploy parameters"
        );
        Ok(params)
    }

    /// Resolve parameters from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load and validate parameters from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&raw)?;
        params.validate()?;
        tracing::info!(path = %path.display(), "loaded deploy parameters");
        Ok(params)
    }

    /// The operator address, defaulting to the admin.
    pub fn operator(&self) -> &str {
        self.operator.as_deref().unwrap_or(&self.admin)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_strkey(ENV_ADMIN, &self.admin, &['G', 'C'])?;
        check_strkey(ENV_PAYMENT_TOKEN, &self.payment_token, &['C'])?;
        check_strkey(ENV_TREASURY, &self.treasury, &['G', 'C'])?;
        check_strkey(ENV_OPERATOR, self.operator(), &['G', 'C'])?;
        if self.price_per_30d < 0 {
            return Err(ConfigError::Invalid {
                name: ENV_PRICE_PER_30D,
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// `--name value` pairs for invoking `init`, in parameter order.
    pub fn init_args(&self) -> Vec<String> {
        [
            ("--admin", self.admin.clone()),
            ("--payment_token", self.payment_token.clone()),
            ("--price_per_30d", self.price_per_30d.to_string()),
            ("--treasury", self.treasury.clone()),
            ("--operator", self.operator().to_string()),
            ("--grace_seconds", self.grace_seconds.to_string()),
        ]
        .into_iter()
        .flat_map(|(flag, value)| [flag.to_string(), value])
        .collect()
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// Shape check for a Stellar strkey (account `G…` or contract `C…`).
/// The checksum is left to the CLI that submits the transaction.
fn check_strkey(name: &'static str, value: &str, prefixes: &[char]) -> ConfigResult<()> {
    let invalid = |reason: String| ConfigError::Invalid { name, reason };

    if value.len() != STRKEY_LEN {
        return Err(invalid(format!(
            "expected {STRKEY_LEN} characters, got {}",
            value.len()
        )));
    }
    let first = value.chars().next().unwrap_or_default();
    if !prefixes.contains(&first) {
        return Err(invalid(format!("unexpected prefix '{first}'")));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c))
    {
        return Err(invalid("not base32".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn key(prefix: char, fill: char) -> String {
        format!("{prefix}{}", fill.to_string().repeat(STRKEY_LEN - 1))
    }

    fn vars(pairs: &[(&str, String)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn base_vars() -> HashMap<String, String> {
        vars(&[
            (ENV_ADMIN, key('G', 'A')),
            (ENV_PAYMENT_TOKEN, key('C', 'B')),
            (ENV_TREASURY, key('G', 'T')),
        ])
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let env = base_vars();
        let params = DeployParams::from_vars(|k| env.get(k).cloned()).unwrap();

        assert_eq!(params.price_per_30d, DEFAULT_PRICE_PER_30D);
        assert_eq!(params.grace_seconds, 172_800);
        assert_eq!(params.operator(), key('G', 'A'));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let mut env = base_vars();
        env.insert(ENV_PRICE_PER_30D.into(), " 250000 ".into());
        env.insert(ENV_GRACE_SECONDS.into(), "3600".into());
        env.insert(ENV_OPERATOR.into(), key('G', 'O'));
        let params = DeployParams::from_vars(|k| env.get(k).cloned()).unwrap();

        assert_eq!(params.price_per_30d, 250_000);
        assert_eq!(params.grace_seconds, 3_600);
        assert_eq!(params.operator(), key('G', 'O'));
    }

    #[test]
    fn missing_treasury_is_reported() {
        let mut env = base_vars();
        env.remove(ENV_TREASURY);
        let err = DeployParams::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_TREASURY)));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut env = base_vars();
        env.insert(ENV_ADMIN.into(), "   ".into());
        let err = DeployParams::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_ADMIN)));
    }

    #[test]
    fn unparsable_numbers_are_rejected() {
        let mut env = base_vars();
        env.insert(ENV_GRACE_SECONDS.into(), "two days".into());
        let err = DeployParams::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: ENV_GRACE_SECONDS,
                ..
            }
        ));
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut env = base_vars();
        env.insert(ENV_PRICE_PER_30D.into(), "-1".into());
        let err = DeployParams::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: ENV_PRICE_PER_30D,
                ..
            }
        ));
    }

    #[test]
    fn payment_token_must_be_a_contract() {
        let mut env = base_vars();
        env.insert(ENV_PAYMENT_TOKEN.into(), key('G', 'B'));
        let err = DeployParams::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: ENV_PAYMENT_TOKEN,
                ..
            }
        ));
    }

    #[test]
    fn strkey_shape_checks() {
        assert!(check_strkey("X", &key('G', 'A'), &['G']).is_ok());
        assert!(check_strkey("X", &key('G', '7'), &['G']).is_ok());
        assert!(check_strkey("X", "GABC", &['G']).is_err());
        assert!(check_strkey("X", &key('G', 'a'), &['G']).is_err());
        assert!(check_strkey("X", &key('G', '1'), &['G']).is_err());
    }

    #[test]
    fn init_args_follow_parameter_order() {
        let env = base_vars();
        let params = DeployParams::from_vars(|k| env.get(k).cloned()).unwrap();
        let args = params.init_args();

        let flags: Vec<&str> = args.iter().step_by(2).map(String::as_str).collect();
        assert_eq!(
            flags,
            [
                "--admin",
                "--payment_token",
                "--price_per_30d",
                "--treasury",
                "--operator",
                "--grace_seconds"
            ]
        );
        assert_eq!(args[5], "100000");
        assert_eq!(args[9], key('G', 'A'));
        assert_eq!(args[11], "172800");
    }

    #[test]
    fn json_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        let body = serde_json::json!({
            "admin": key('G', 'A'),
            "payment_token": key('C', 'B'),
            "treasury": key('C', 'T'),
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let params = DeployParams::from_json_file(&path).unwrap();
        assert_eq!(params.price_per_30d, DEFAULT_PRICE_PER_30D);
        assert_eq!(params.grace_seconds, DEFAULT_GRACE_SECONDS);
        assert_eq!(params.operator, None);
    }

    #[test]
    fn json_file_errors_surface() {
        let dir = tempfile::tempdir().unwrap();

        let missing = DeployParams::from_json_file(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let bad = DeployParams::from_json_file(&path).unwrap_err();
        assert!(matches!(bad, ConfigError::Json(_)));
    }
}

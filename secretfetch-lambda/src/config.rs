//! Per-invocation configuration

use std::collections::HashMap;
use std::env::VarError;

use serde::Deserialize;

use secretfetch_core::DEFAULT_REGION;

use crate::error::RetrievalError;

const SECRET_NAME: &str = "SECRET_NAME";
const AWS_REGION: &str = "AWS_REGION";

/// Resolves one environment variable by its exact name
pub(crate) type VarLookup = dyn Fn(&str) -> Result<String, VarError> + Send + Sync;

/// Values the function reads from its environment on every invocation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Configuration {
    /// `SECRET_NAME`
    #[serde(default)]
    pub secret_name: Option<String>,

    /// `AWS_REGION`
    #[serde(rename = "aws_region", default = "default_region")]
    pub region_name: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Configuration {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, RetrievalError> {
        Self::load(&|name: &str| std::env::var(name))
    }

    /// Load from an explicit set of variables instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, RetrievalError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::load(&lookup_in(collect_vars(vars)))
    }

    /// Load through `lookup`. Names are matched exactly; other variables are
    /// never consulted.
    pub(crate) fn load(lookup: &VarLookup) -> Result<Self, RetrievalError> {
        let mut vars = config::Map::new();
        for name in [SECRET_NAME, AWS_REGION] {
            match lookup(name) {
                Ok(value) => {
                    vars.insert(name.to_string(), value);
                }
                Err(VarError::NotPresent) => {}
                Err(VarError::NotUnicode(_)) => {
                    return Err(RetrievalError::Configuration(format!(
                        "{name} is not valid unicode"
                    )));
                }
            }
        }

        let settings = config::Config::builder()
            .add_source(config::Environment::default().source(Some(vars)))
            .build()?;

        Ok(settings.try_deserialize::<Configuration>()?)
    }
}

/// Lookup over a fixed set of variables
pub(crate) fn lookup_in(
    vars: HashMap<String, String>,
) -> impl Fn(&str) -> Result<String, VarError> + Send + Sync {
    move |name: &str| vars.get(name).cloned().ok_or(VarError::NotPresent)
}

/// Owned variables; later duplicates win
pub(crate) fn collect_vars<I, K, V>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    vars.into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

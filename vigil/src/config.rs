use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use vigil_core::TargetSpec;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Cycle duration for targets without their own.
    #[serde(default)]
    pub duration: Option<YamlDuration>,

    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub tests: Vec<TestYaml>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestYaml {
    pub name: String,
    pub url: String,

    #[serde(default)]
    pub qps: f64,

    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    #[serde(default)]
    pub duration: Option<YamlDuration>,

    #[serde(default, deserialize_with = "deserialize_headers")]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub jitter: bool,

    #[serde(default)]
    pub uniform: bool,
}

fn default_concurrency() -> u32 {
    1
}

impl ConfigFile {
    pub fn global_duration(&self) -> Option<Duration> {
        self.duration.map(YamlDuration::into_inner)
    }

    pub fn target_specs(&self) -> Vec<TargetSpec> {
        self.tests
            .iter()
            .map(|t| TargetSpec {
                name: t.name.clone(),
                url: t.url.clone(),
                qps: t.qps,
                concurrency: t.concurrency,
                duration: t.duration.map(YamlDuration::into_inner),
                headers: t.headers.clone(),
                jitter: t.jitter,
                uniform: t.uniform,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 60s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let secs = u64::try_from(v).map_err(|_| E::custom("duration must not be negative"))?;
                Ok(YamlDuration(Duration::from_secs(secs)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Duration::try_from_secs_f64(v)
                    .map(YamlDuration)
                    .map_err(|_| E::custom("duration must be a non-negative, finite number"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// Header values may be written as YAML scalars of any kind; `null` entries are dropped.
fn deserialize_headers<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_yaml::Value>>::deserialize(deserializer)?;
    let mut out = BTreeMap::new();

    for (k, v) in raw.unwrap_or_default() {
        let s = match v {
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::String(s) => s,
            _ => {
                return Err(serde::de::Error::custom(format!(
                    "header '{k}' must be a scalar value"
                )));
            }
        };
        out.insert(k, s);
    }

    Ok(out)
}

pub fn parse(text: &str) -> anyhow::Result<ConfigFile> {
    // An empty document is valid YAML but has no targets; let startup validation report it.
    if text.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(text).context("invalid configuration document")
}

pub async fn load(path: &Path) -> anyhow::Result<ConfigFile> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;

    parse(&text).with_context(|| format!("failed to parse config: {}", path.display()))
}

use std::{env, path::PathBuf, time::Duration};

use anyhow::Result;

use crate::view::ViewKind;

#[derive(Clone, Debug)]
pub struct Config {
    pub source: String,
    pub output: PathBuf,
    pub view: ViewKind,
    pub cache_path: PathBuf,
    pub cache_ttl: Duration,
    pub resize_debounce: Duration,
    pub log_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_env_reader(|key| env::var(key).ok())
    }

    pub fn from_env_reader<F>(reader: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source =
            read_env_optional(&reader, "SITEMAP_SOURCE").unwrap_or_else(|| "sitemap.xml".to_string());
        let output = read_env_optional(&reader, "SITEMAP_OUTPUT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("sitemap.js"));
        let view = match read_env_optional(&reader, "SITEMAP_VIEW") {
            Some(value) => value
                .parse::<ViewKind>()
                .map_err(|err| anyhow::anyhow!("invalid SITEMAP_VIEW: {err}"))?,
            None => ViewKind::default(),
        };
        let cache_ttl_seconds =
            read_env_u64_optional(&reader, "SITEMAP_CACHE_TTL_SECONDS")?.unwrap_or(300);
        let debounce_ms = read_env_u64_optional(&reader, "SITEMAP_RESIZE_DEBOUNCE_MS")?.unwrap_or(250);
        let cache_path = read_env_optional(&reader, "SITEMAP_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("cache.json"));
        let log_path = read_env_optional(&reader, "SITEMAP_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("sitemap-tree.log"));

        Ok(Self {
            source,
            output,
            view,
            cache_path,
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            resize_debounce: Duration::from_millis(debounce_ms),
            log_path,
        })
    }
}

fn read_env_optional<F>(reader: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    reader(key).filter(|value| !value.trim().is_empty())
}

fn read_env_u64_optional<F>(reader: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = read_env_optional(reader, key) else {
        return Ok(None);
    };
    let parsed = value
        .trim()
        .parse::<u64>()
        .map_err(|_| anyhow::anyhow!("invalid integer for {key}: {value}"))?;
    Ok(Some(parsed))
}

fn data_dir() -> PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("sitemap-tree")
}

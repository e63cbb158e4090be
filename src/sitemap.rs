//! Reading sitemap sources and writing the generated data module.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::{
    cache::CacheStore,
    config::Config,
    tree::{BuildReport, SiteTree},
};

static LOC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<loc>(.*?)</loc>").expect("static <loc> pattern compiles")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Remote(String),
    Artifact(PathBuf),
    Sitemap(PathBuf),
}

impl Source {
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Source::Remote(trimmed.to_string());
        }
        let path = PathBuf::from(trimmed);
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("js" | "json") => Source::Artifact(path),
            _ => Source::Sitemap(path),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Source::Remote(url) => url.clone(),
            Source::Artifact(path) | Source::Sitemap(path) => path.display().to_string(),
        }
    }
}

/// Text of every `<loc>` element in document order, with XML entities decoded.
pub fn extract_locs(text: &str) -> Vec<String> {
    LOC_PATTERN
        .captures_iter(text)
        .map(|caps| decode_entities(&caps[1]))
        .collect()
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub struct LoadedTree {
    pub tree: SiteTree,
    pub report: Option<BuildReport>,
    pub origin: String,
}

impl LoadedTree {
    pub fn summary(&self) -> String {
        match &self.report {
            Some(report) => format!(
                "{} | urls: {}, skipped: {}, nodes: {}",
                self.origin,
                report.accepted,
                report.skipped.len(),
                self.tree.len()
            ),
            None => format!("{} | nodes: {}", self.origin, self.tree.len()),
        }
    }
}

pub fn load_tree(config: &Config) -> Result<LoadedTree> {
    let source = Source::classify(&config.source);
    let origin = source.describe();
    match &source {
        Source::Artifact(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading data module {}", path.display()))?;
            let tree = SiteTree::from_artifact(&text)?;
            info!(source = %origin, nodes = tree.len(), "loaded data module");
            Ok(LoadedTree {
                tree,
                report: None,
                origin,
            })
        }
        Source::Remote(url) => {
            let cache = CacheStore::new(config.cache_path.clone(), config.cache_ttl);
            let text = fetch_sitemap(url, &cache)?;
            build_from_text(&text, origin)
        }
        Source::Sitemap(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading sitemap {}", path.display()))?;
            build_from_text(&text, origin)
        }
    }
}

fn build_from_text(text: &str, origin: String) -> Result<LoadedTree> {
    let urls = extract_locs(text);
    info!(source = %origin, count = urls.len(), "extracted URLs");
    let (tree, report) = SiteTree::build(&urls)?;
    Ok(LoadedTree {
        tree,
        report: Some(report),
        origin,
    })
}

fn fetch_sitemap(url: &str, cache: &CacheStore) -> Result<String> {
    if let Some(body) = cache.load(url) {
        info!(source = url, "using cached sitemap");
        return Ok(body);
    }
    let client = reqwest::blocking::Client::new();
    let body = client
        .get(url)
        .send()
        .with_context(|| format!("fetching {url}"))?
        .error_for_status()?
        .text()?;
    if let Err(err) = cache.store(url, &body) {
        warn!(error = %err, "could not cache sitemap");
    }
    Ok(body)
}

/// Writes the tree as bare JSON for `.json` paths, otherwise as a data module.
pub fn write_artifact(tree: &SiteTree, path: &Path) -> Result<()> {
    let text = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => tree.to_json()?,
        _ => tree.to_module()?,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output dir {}", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// One-shot conversion: sitemap in, data module out. Nothing is written
/// when no URL could be parsed.
pub fn convert(config: &Config) -> Result<BuildReport> {
    let source = Source::classify(&config.source);
    if let Source::Artifact(path) = &source {
        anyhow::bail!("{} is already a data module", path.display());
    }
    let loaded = load_tree(config)?;
    let report = loaded.report.unwrap_or_default();
    for skipped in &report.skipped {
        warn!(index = skipped.index, url = %skipped.url, reason = %skipped.reason, "skipped entry");
    }
    write_artifact(&loaded.tree, &config.output)?;
    info!(
        output = %config.output.display(),
        root = %loaded.tree.root().name,
        nodes = loaded.tree.len(),
        "wrote data module"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeError;
    use std::time::Duration;

    fn test_config(source: &Path, output: &Path) -> Config {
        Config {
            source: source.display().to_string(),
            output: output.to_path_buf(),
            view: Default::default(),
            cache_path: output.with_extension("cache.json"),
            cache_ttl: Duration::from_secs(60),
            resize_debounce: Duration::from_millis(250),
            log_path: output.with_extension("log"),
        }
    }

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://a.com/docs/intro</loc></url>
  <url><loc>https://a.com/docs/api?lang=en&amp;v=2</loc></url>
  <url><loc>https://a.com/blog</loc><lastmod>2024-01-01</lastmod></url>
</urlset>"#;

    #[test]
    fn extract_locs_keeps_document_order() {
        let urls = extract_locs(SITEMAP);
        assert_eq!(
            urls,
            vec![
                "https://a.com/docs/intro",
                "https://a.com/docs/api?lang=en&v=2",
                "https://a.com/blog",
            ]
        );
    }

    #[test]
    fn extract_locs_without_entries_is_empty() {
        assert!(extract_locs("<urlset></urlset>").is_empty());
    }

    #[test]
    fn classify_distinguishes_sources() {
        assert_eq!(
            Source::classify("https://a.com/sitemap.xml"),
            Source::Remote("https://a.com/sitemap.xml".to_string())
        );
        assert_eq!(
            Source::classify("out/sitemap.js"),
            Source::Artifact(PathBuf::from("out/sitemap.js"))
        );
        assert_eq!(
            Source::classify("tree.json"),
            Source::Artifact(PathBuf::from("tree.json"))
        );
        assert_eq!(
            Source::classify("sitemap.xml"),
            Source::Sitemap(PathBuf::from("sitemap.xml"))
        );
    }

    #[test]
    fn convert_writes_loadable_module() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("sitemap.xml");
        let output = dir.path().join("generated").join("sitemap.js");
        std::fs::write(&source, SITEMAP).expect("write sitemap");

        let report = convert(&test_config(&source, &output)).expect("convert");
        assert_eq!(report.accepted, 3);
        assert!(report.skipped.is_empty());

        let text = std::fs::read_to_string(&output).expect("read output");
        assert!(text.starts_with("const sitemapData = "));
        let tree = SiteTree::from_artifact(&text).expect("load output");
        assert_eq!(tree.root().name, "https://a.com");
        assert_eq!(tree.root().total, 4);
    }

    #[test]
    fn convert_writes_bare_json_for_json_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("sitemap.xml");
        let output = dir.path().join("tree.json");
        std::fs::write(&source, SITEMAP).expect("write sitemap");

        convert(&test_config(&source, &output)).expect("convert");
        let text = std::fs::read_to_string(&output).expect("read output");
        let value: serde_json::Value = serde_json::from_str(&text).expect("bare json");
        assert_eq!(value["name"], "https://a.com");
    }

    #[test]
    fn convert_without_parseable_urls_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("sitemap.xml");
        let output = dir.path().join("sitemap.js");
        std::fs::write(&source, "<loc>not a url</loc><loc>also bad</loc>").expect("write sitemap");

        let err = convert(&test_config(&source, &output)).expect_err("should fail");
        assert!(matches!(
            err.downcast_ref::<TreeError>(),
            Some(TreeError::NoData { skipped: 2 })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn convert_reports_skipped_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("sitemap.xml");
        let output = dir.path().join("sitemap.js");
        std::fs::write(&source, "<loc>https://a.com/x</loc><loc>bad</loc>").expect("write sitemap");

        let report = convert(&test_config(&source, &output)).expect("convert");
        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].url, "bad");
        assert!(output.exists());
    }

    #[test]
    fn load_tree_reads_data_module() {
        let dir = tempfile::tempdir().expect("tempdir");
        let module = dir.path().join("sitemap.js");
        let (tree, _) = SiteTree::build(&["https://a.com/x/y"]).expect("build");
        write_artifact(&tree, &module).expect("write module");

        let loaded = load_tree(&test_config(&module, &dir.path().join("unused.js"))).expect("load");
        assert!(loaded.report.is_none());
        assert_eq!(loaded.tree.export(), tree.export());
        assert!(loaded.summary().ends_with("nodes: 3"));
    }
}

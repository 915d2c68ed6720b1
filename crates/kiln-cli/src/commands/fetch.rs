//! Remote export fetch command

use anyhow::{Context, Result};
use kiln_asset::{FetchCache, FetchResponse, HttpFetcher, RemoteFetcher};
use kiln_import::ImportConfig;

pub fn run(object_path: &str, url: Option<&str>, output: Option<&str>) -> Result<()> {
    let config = ImportConfig::load().context("Failed to load config")?;
    let url = url.unwrap_or(&config.remote.url);

    let mut fetcher = HttpFetcher::new(url, config.remote_timeout());
    if let Some(cache_dir) = &config.remote.cache_directory {
        fetcher = fetcher.with_cache(FetchCache::new(cache_dir));
    }

    tracing::info!(url, object_path, "fetching exports");
    let response = fetcher
        .fetch(object_path)
        .with_context(|| format!("Failed to fetch {} from {}", object_path, url))?;

    match response {
        FetchResponse::Exports(exports) => {
            let text = serde_json::to_string_pretty(&exports)?;
            match output {
                Some(path) => {
                    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path))?;
                    println!("Wrote exports of {} to {}", object_path, path);
                }
                None => println!("{}", text),
            }
        }
        FetchResponse::Binary(bytes) => {
            let Some(path) = output else {
                anyhow::bail!(
                    "{} returned a binary payload ({} bytes); use --output to save it",
                    object_path,
                    bytes.len()
                );
            };
            std::fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path))?;
            println!("Wrote {} bytes for {} to {}", bytes.len(), object_path, path);
        }
        FetchResponse::NotFound => {
            anyhow::bail!("{} not found on {}", object_path, url);
        }
    }

    Ok(())
}

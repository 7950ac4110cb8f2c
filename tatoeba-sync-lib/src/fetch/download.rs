use super::Progress;
use crate::Result;
use crate::store::path_utils::url_file_name;
use core::sync::atomic::{AtomicU64, Ordering};
use futures_util::TryStreamExt;
use ohno::{IntoAppError, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use url::Url;

const LOG_TARGET: &str = "  download";

/// Stream the body of `url` into `out_dir`, under the last segment of the URL.
///
/// Any file already at that path is overwritten.
pub async fn download(client: &reqwest::Client, url: &Url, out_dir: &Path, progress: &dyn Progress) -> Result<PathBuf> {
    let name = url_file_name(url);
    if name.is_empty() {
        bail!("'{url}' does not name a file");
    }
    let target = out_dir.join(name);

    log::info!(target: LOG_TARGET, "Downloading {url}");

    let response = client
        .get(url.clone())
        .send()
        .await
        .into_app_err_with(|| format!("unable to start downloading {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("unable to download {url}: HTTP {status}");
    }

    tokio::fs::create_dir_all(out_dir)
        .await
        .into_app_err_with(|| format!("unable to create directory '{}'", out_dir.display()))?;

    let mut file = tokio::fs::File::create(&target)
        .await
        .into_app_err_with(|| format!("unable to create '{}'", target.display()))?;

    let downloaded = Arc::new(AtomicU64::new(0));
    let reported = Arc::clone(&downloaded);
    let label = name.to_string();
    match response.content_length() {
        Some(total) => progress.set_determinate(Box::new(move || {
            let current = reported.load(Ordering::Relaxed);
            (total, current, format!("{}/{} KB: {label}", current / 1024, total / 1024))
        })),
        None => progress.set_indeterminate(Box::new(move || {
            format!("{} KB: {label}", reported.load(Ordering::Relaxed) / 1024)
        })),
    }

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream
        .try_next()
        .await
        .into_app_err_with(|| format!("connection lost while downloading {url}"))?
    {
        file.write_all(&chunk)
            .await
            .into_app_err_with(|| format!("unable to write to '{}'", target.display()))?;
        let _ = downloaded.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    }

    file.flush()
        .await
        .into_app_err_with(|| format!("unable to flush '{}'", target.display()))?;

    log::debug!(
        target: LOG_TARGET,
        "Downloaded {} bytes to '{}'",
        downloaded.load(Ordering::Relaxed),
        target.display()
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::NoProgress;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_download_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stats/queries.csv.bz2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("queries");
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(out_dir.join("queries.csv.bz2"), b"stale bytes that are longer").unwrap();

        let url = Url::parse(&format!("{}/stats/queries.csv.bz2", server.uri())).unwrap();
        let target = download(&reqwest::Client::new(), &url, &out_dir, &NoProgress).await.unwrap();

        assert_eq!(target, out_dir.join("queries.csv.bz2"));
        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_error_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("{}/exports/links.tar.bz2", server.uri())).unwrap();
        let err = download(&reqwest::Client::new(), &url, dir.path(), &NoProgress).await.unwrap_err();

        assert!(err.to_string().contains("404"));
        assert!(!dir.path().join("links.tar.bz2").exists());
    }
}

use crate::Result;
use chrono::NaiveDateTime;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Instant;
use url::Url;

const LOG_TARGET: &str = "  listings";

/// How long a fetched directory listing is reused.
pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(5 * 60);

const LISTING_DATE_FORMAT: &str = "%d-%b-%Y %H:%M";

/// An anchor followed by the modification time column of an index page.
static ENTRY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a href="([^"]+)">[^<]*</a>\s+(\d{2}-[A-Za-z]{3}-\d{4} \d{2}:\d{2})"#).expect("invalid regex")
});

static ANCHOR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<a href="([^"]+)">"#).expect("invalid regex"));

/// Tells which remote files exist and when they were last published.
pub trait VersionSource: Send + Sync {
    /// Map the absolute URL of every file listed in `directory` to its publication time.
    fn get_versions(&self, directory: &Url) -> impl Future<Output = Result<HashMap<Url, NaiveDateTime>>> + Send;

    /// The names of the sub-directories listed in `directory`.
    fn get_names(&self, directory: &Url) -> impl Future<Output = Result<Vec<String>>> + Send;
}

#[derive(Debug)]
struct CachedListing {
    fetched_at: Instant,
    body: Arc<str>,
}

/// Reads versions from the HTML index pages of the download server.
///
/// Each listing is fetched at most once per TTL.
#[derive(Debug)]
pub struct HttpVersionSource {
    client: reqwest::Client,
    ttl: Duration,
    cache: Mutex<HashMap<Url, CachedListing>>,
}

impl HttpVersionSource {
    #[must_use]
    pub fn new(client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, directory: &Url) -> Option<Arc<str>> {
        let cache = self.cache.lock().expect("lock poisoned");
        cache
            .get(directory)
            .filter(|listing| listing.fetched_at.elapsed() < self.ttl)
            .map(|listing| Arc::clone(&listing.body))
    }

    async fn listing(&self, directory: &Url) -> Result<(Url, Arc<str>)> {
        let directory = as_directory(directory);
        if let Some(body) = self.cached(&directory) {
            log::debug!(target: LOG_TARGET, "Using cached listing of {directory}");
            return Ok((directory, body));
        }

        log::debug!(target: LOG_TARGET, "Fetching listing of {directory}");
        let response = self
            .client
            .get(directory.clone())
            .send()
            .await
            .into_app_err_with(|| format!("unable to request listing {directory}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("unable to read listing {directory}: HTTP {status}");
        }

        let body: Arc<str> = Arc::from(
            response
                .text()
                .await
                .into_app_err_with(|| format!("unable to read listing {directory}"))?,
        );

        let _ = self.cache.lock().expect("lock poisoned").insert(
            directory.clone(),
            CachedListing {
                fetched_at: Instant::now(),
                body: Arc::clone(&body),
            },
        );

        Ok((directory, body))
    }
}

impl VersionSource for HttpVersionSource {
    async fn get_versions(&self, directory: &Url) -> Result<HashMap<Url, NaiveDateTime>> {
        let (directory, body) = self.listing(directory).await?;
        Ok(parse_versions(&directory, &body))
    }

    async fn get_names(&self, directory: &Url) -> Result<Vec<String>> {
        let (_, body) = self.listing(directory).await?;
        Ok(parse_names(&body))
    }
}

/// `url` with a trailing `/`, so relative links resolve inside it.
fn as_directory(url: &Url) -> Url {
    let mut directory = url.clone();
    if !directory.path().ends_with('/') {
        let path = format!("{}/", directory.path());
        directory.set_path(&path);
    }
    directory
}

/// Files listed in an index page, with their modification time.
fn parse_versions(directory: &Url, body: &str) -> HashMap<Url, NaiveDateTime> {
    let mut versions = HashMap::new();
    for captures in ENTRY_REGEX.captures_iter(body) {
        let (_, [href, stamp]) = captures.extract();
        if href.ends_with('/') {
            continue;
        }

        let Ok(url) = directory.join(href) else {
            log::debug!(target: LOG_TARGET, "Ignoring unusable link '{href}' in {directory}");
            continue;
        };

        match NaiveDateTime::parse_from_str(stamp, LISTING_DATE_FORMAT) {
            Ok(version) => {
                let _ = versions.insert(url, version);
            }
            Err(e) => log::debug!(target: LOG_TARGET, "Ignoring '{href}' with unreadable date '{stamp}': {e}"),
        }
    }

    versions
}

/// Sub-directories of an index page whose name is purely alphabetic.
fn parse_names(body: &str) -> Vec<String> {
    ANCHOR_REGEX
        .captures_iter(body)
        .filter_map(|captures| captures.get(1))
        .filter_map(|href| href.as_str().strip_suffix('/'))
        .filter(|name| !name.is_empty() && name.chars().all(char::is_alphabetic))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EXPORTS: &str = r#"<html><head><title>Index of /exports/</title></head><body>
<h1>Index of /exports/</h1><hr><pre><a href="../">../</a>
<a href="per_language/">per_language/</a>                                      07-Oct-2026 06:33       -
<a href="links.tar.bz2">links.tar.bz2</a>                                      07-Oct-2026 06:10     123M
<a href="user_lists.tar.bz2">user_lists.tar.bz2</a>                            06-Oct-2026 23:59      1M
</pre><hr></body></html>"#;

    const LANGUAGES: &str = r#"<pre><a href="../">../</a>
<a href="eng/">eng/</a>                 07-Oct-2026 06:33       -
<a href="fra/">fra/</a>                 07-Oct-2026 06:33       -
<a href="cmn-Hant/">cmn-Hant/</a>       07-Oct-2026 06:33       -
<a href="README">README</a>             07-Oct-2026 06:33       1K
</pre>"#;

    #[test]
    fn test_parse_versions() {
        let directory = Url::parse("https://downloads.tatoeba.org/exports/").unwrap();
        let versions = parse_versions(&directory, EXPORTS);

        assert_eq!(versions.len(), 2);
        let links = Url::parse("https://downloads.tatoeba.org/exports/links.tar.bz2").unwrap();
        assert_eq!(
            versions[&links],
            NaiveDate::from_ymd_opt(2026, 10, 7).unwrap().and_hms_opt(6, 10, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_names(LANGUAGES), ["eng", "fra"]);
    }

    #[test]
    fn test_as_directory() {
        let url = Url::parse("https://downloads.tatoeba.org/exports").unwrap();
        assert_eq!(as_directory(&url).as_str(), "https://downloads.tatoeba.org/exports/");
        assert_eq!(as_directory(&as_directory(&url)), as_directory(&url));
    }

    #[tokio::test]
    async fn test_listing_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exports/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EXPORTS))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpVersionSource::new(reqwest::Client::new(), DEFAULT_LISTING_TTL);
        let directory = Url::parse(&format!("{}/exports", server.uri())).unwrap();

        let first = source.get_versions(&directory).await.unwrap();
        let second = source.get_versions(&directory).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_listing_is_fetched_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exports/per_language/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LANGUAGES))
            .expect(2)
            .mount(&server)
            .await;

        let source = HttpVersionSource::new(reqwest::Client::new(), Duration::ZERO);
        let directory = Url::parse(&format!("{}/exports/per_language/", server.uri())).unwrap();

        assert_eq!(source.get_names(&directory).await.unwrap(), ["eng", "fra"]);
        assert_eq!(source.get_names(&directory).await.unwrap(), ["eng", "fra"]);
    }

    #[tokio::test]
    async fn test_failed_listing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = HttpVersionSource::new(reqwest::Client::new(), DEFAULT_LISTING_TTL);
        let directory = Url::parse(&format!("{}/stats/", server.uri())).unwrap();
        assert!(source.get_versions(&directory).await.is_err());
    }
}

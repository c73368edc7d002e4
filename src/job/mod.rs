//! Jobs and the job source
//!
//! A [`Job`] is one URL to fetch. The source hands jobs one at a time into
//! the bounded jobs channel and closes it once the list is exhausted.

mod source;

pub use source::spawn_job_source;

use crate::fetch::FetchError;
use std::fmt;
use url::Url;

/// Position of a job in the input list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One unit of work: a URL to fetch
///
/// Jobs are immutable once built; the URL is kept as the caller wrote it and
/// parsed only when a worker picks the job up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: JobId,
    url: String,
}

impl Job {
    pub fn new(id: JobId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
        }
    }

    /// Builds jobs from a URL list, numbering them in input order
    pub fn from_urls<I, S>(urls: I) -> Vec<Job>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .enumerate()
            .map(|(i, url)| Job::new(JobId(i), url))
            .collect()
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Parses the job URL, accepting only http and https
    pub fn parse_url(&self) -> Result<Url, FetchError> {
        let url = Url::parse(self.url.trim())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", self.url, e)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(FetchError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                self.url, other
            ))),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.url)
    }
}

use crate::config::USER_AGENT;
use crate::error::ScrapeError;
use async_trait::async_trait;
use tracing::debug;

/// Transport seam used by the pipeline stages.
///
/// Takes `&mut self` so an implementation can build its connection state on
/// first use. Each pool slot owns one fetcher; fetchers are never shared.
#[async_trait]
pub trait Fetch: Send {
    async fn fetch(&mut self, url: &str) -> Result<String, ScrapeError>;
}

/// HTTP session owned by one pool worker.
///
/// The underlying client (and its connection pool) is created on the first
/// request and reused for every later request made by the same worker.
#[derive(Default)]
pub struct HttpSession {
    client: Option<reqwest::Client>,
}

impl HttpSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&mut self, url: &str) -> Result<&reqwest::Client, ScrapeError> {
        let client = match self.client {
            Some(ref client) => client,
            None => {
                debug!("Creating HTTP session");
                let client = reqwest::Client::builder()
                    .user_agent(USER_AGENT)
                    .build()
                    .map_err(|source| ScrapeError::Fetch {
                        url: url.to_string(),
                        source,
                    })?;
                &*self.client.insert(client)
            }
        };

        Ok(client)
    }
}

#[async_trait]
impl Fetch for HttpSession {
    async fn fetch(&mut self, url: &str) -> Result<String, ScrapeError> {
        let client = self.client(url)?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|source| ScrapeError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| ScrapeError::Fetch {
            url: url.to_string(),
            source,
        })
    }
}

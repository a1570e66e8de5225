use reqwest::redirect::Policy;
use std::time::Duration;

use crate::config::Settings;
use crate::storage::Database;

const USER_AGENT: &str = concat!("rssbar/", env!("CARGO_PKG_VERSION"));

/// Everything built once at startup and shared by the controller, the poller
/// and the command line front end.
#[derive(Clone)]
pub struct AppContext {
    pub db: Database,
    pub client: reqwest::Client,
    pub settings: Settings,
}

impl AppContext {
    pub fn new(db: Database, settings: Settings) -> Result<Self, reqwest::Error> {
        let client = build_http_client()?;
        Ok(Self {
            db,
            client,
            settings,
        })
    }
}

/// HTTP client used for every feed download.
///
/// Carries no request timeout of its own. The per-source timeout in
/// [`fetch_entries`](crate::feed::fetch_entries) is read from the current
/// settings on every refresh, so a reloaded value takes effect immediately.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

/// At most 3 hops, and no URL may appear twice in the chain.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev == url) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            to = %url,
            hop = attempt.previous().len(),
            "Following feed redirect"
        );
        attempt.follow()
    })
}

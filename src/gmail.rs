use crate::models::{FilterAction, FilterCriteria, FilterList, RemoteFilter, User};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

pub const TRASH_LABEL: &str = "TRASH";
pub const INBOX_LABEL: &str = "INBOX";

/// Errors surfaced by the Gmail settings API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Gmail rejected the credentials (HTTP {0}), sign in again")]
    Authorization(u16),
    #[error("Gmail returned HTTP {0}")]
    Http(u16),
    #[error("unreadable filter listing: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
}

/// A filter counts as the kill switch iff it matches every sender and
/// files the message under TRASH. Sender exceptions configured in the UI
/// are not part of this predicate.
fn is_kill_filter(filter: &RemoteFilter) -> bool {
    filter.criteria.from.as_deref() == Some("*")
        && filter.action.add_label_ids.iter().any(|l| l == TRASH_LABEL)
}

#[derive(Clone)]
pub struct GmailClient {
    client: Client,
    base_url: String,
    userinfo_url: String,
}

impl GmailClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: GMAIL_API_BASE.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_urls(base_url: &str, userinfo_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            userinfo_url: userinfo_url.to_string(),
        }
    }

    fn status_error(status: StatusCode) -> ApiError {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            ApiError::Authorization(status.as_u16())
        } else {
            ApiError::Http(status.as_u16())
        }
    }

    async fn fetch_filter_listing(&self, access_token: &str) -> Result<String, ApiError> {
        let url = format!("{}/users/me/settings/filters", self.base_url);
        let res = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            warn!("filter listing failed with HTTP {}", status);
            return Err(Self::status_error(status));
        }
        Ok(res.text().await?)
    }

    /// True iff at least one kill filter exists on the mailbox.
    ///
    /// An empty response body or a body that fails to parse counts as "no
    /// filter" rather than an error; HTTP and transport failures still
    /// surface to the caller.
    pub async fn check_filter(&self, access_token: &str) -> Result<bool, ApiError> {
        let body = self.fetch_filter_listing(access_token).await?;
        if body.is_empty() {
            debug!("filter listing came back empty");
            return Ok(false);
        }

        let listing: FilterList = match serde_json::from_str(&body) {
            Ok(listing) => listing,
            Err(err) => {
                warn!("treating unreadable filter listing as no filter: {}", err);
                return Ok(false);
            }
        };

        let exists = listing.filter.iter().any(is_kill_filter);
        debug!("kill filter present: {}", exists);
        Ok(exists)
    }

    /// Installs the discard-all filter unless one is already present.
    ///
    /// The existence check and the create are two separate requests, so
    /// two concurrent callers can still end up with duplicate filters.
    pub async fn create_filter(&self, access_token: &str) -> Result<(), ApiError> {
        if self.check_filter(access_token).await? {
            debug!("kill filter already present, nothing to create");
            return Ok(());
        }

        let body = RemoteFilter {
            id: None,
            criteria: FilterCriteria {
                from: Some("*".to_string()),
            },
            action: FilterAction {
                add_label_ids: vec![TRASH_LABEL.to_string()],
                remove_label_ids: vec![INBOX_LABEL.to_string()],
            },
        };

        let url = format!("{}/users/me/settings/filters", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            warn!("filter create failed with HTTP {}", status);
            return Err(Self::status_error(status));
        }
        debug!("kill filter created");
        Ok(())
    }

    /// Deletes every kill filter on the mailbox, one request per resource.
    ///
    /// Stops at the first delete that fails; later matches are left in
    /// place and already-deleted ones stay deleted. Unlike `check_filter`,
    /// an unreadable listing here is a hard error.
    pub async fn remove_filter(&self, access_token: &str) -> Result<(), ApiError> {
        let body = self.fetch_filter_listing(access_token).await?;
        if body.is_empty() {
            debug!("filter listing came back empty, nothing to remove");
            return Ok(());
        }

        let listing: FilterList = serde_json::from_str(&body)?;
        let matching: Vec<&RemoteFilter> =
            listing.filter.iter().filter(|f| is_kill_filter(f)).collect();
        if matching.is_empty() {
            debug!("no kill filter to remove");
            return Ok(());
        }

        for filter in matching {
            let Some(id) = filter.id.as_deref() else {
                continue;
            };
            let url = format!("{}/users/me/settings/filters/{}", self.base_url, id);
            let res = self.client.delete(&url).bearer_auth(access_token).send().await?;
            let status = res.status();
            if !status.is_success() {
                warn!("delete of filter {} failed with HTTP {}", id, status);
                return Err(Self::status_error(status));
            }
            debug!("deleted filter {}", id);
        }
        Ok(())
    }

    /// Exchanges the access token for the signed-in account's profile.
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<User, ApiError> {
        let res = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            warn!("userinfo fetch failed with HTTP {}", status);
            return Err(Self::status_error(status));
        }
        Ok(res.json::<User>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FILTERS_PATH: &str = "/users/me/settings/filters";

    fn listing_with_kill_filter() -> String {
        json!({
            "filter": [
                {
                    "id": "keep-1",
                    "criteria": {"from": "newsletter@example.com"},
                    "action": {"removeLabelIds": ["INBOX"]}
                },
                {
                    "id": "kill-1",
                    "criteria": {"from": "*"},
                    "action": {"addLabelIds": ["TRASH"], "removeLabelIds": ["INBOX"]}
                }
            ]
        })
        .to_string()
    }

    fn listing_without_kill_filter() -> String {
        json!({
            "filter": [
                {
                    "id": "keep-1",
                    "criteria": {"from": "newsletter@example.com"},
                    "action": {"addLabelIds": ["SPAM"]}
                },
                {
                    "id": "keep-2",
                    "criteria": {"from": "*"},
                    "action": {"addLabelIds": ["STARRED"]}
                }
            ]
        })
        .to_string()
    }

    async fn client_for(server: &mockito::Server) -> GmailClient {
        GmailClient::with_base_urls(&server.url(), &format!("{}/userinfo", server.url()))
    }

    #[tokio::test]
    async fn check_filter_finds_kill_filter_among_others() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", FILTERS_PATH)
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(listing_with_kill_filter())
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert!(client.check_filter("tok").await.unwrap());
    }

    #[tokio::test]
    async fn check_filter_false_when_no_resource_matches() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body(listing_without_kill_filter())
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert!(!client.check_filter("tok").await.unwrap());
    }

    #[tokio::test]
    async fn check_filter_false_on_empty_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert!(!client.check_filter("tok").await.unwrap());
    }

    #[tokio::test]
    async fn check_filter_false_on_garbage_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body("<html>rate limited</html>")
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert!(!client.check_filter("tok").await.unwrap());
    }

    #[tokio::test]
    async fn check_filter_maps_401_to_authorization_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", FILTERS_PATH)
            .with_status(401)
            .with_body(r#"{"error": {"message": "Invalid Credentials"}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.check_filter("expired").await.unwrap_err();
        assert!(matches!(err, ApiError::Authorization(401)));
    }

    #[tokio::test]
    async fn check_filter_maps_other_statuses_to_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", FILTERS_PATH)
            .with_status(503)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.check_filter("tok").await.unwrap_err();
        assert!(matches!(err, ApiError::Http(503)));
    }

    #[tokio::test]
    async fn create_filter_skips_post_when_already_present() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body(listing_with_kill_filter())
            .create_async()
            .await;
        let post = server
            .mock("POST", FILTERS_PATH)
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server).await;
        client.create_filter("tok").await.unwrap();
        post.assert_async().await;
    }

    #[tokio::test]
    async fn create_filter_posts_the_discard_rule() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body(r#"{"filter": []}"#)
            .create_async()
            .await;
        let post = server
            .mock("POST", FILTERS_PATH)
            .match_header("authorization", "Bearer tok")
            .match_body(mockito::Matcher::PartialJson(json!({
                "criteria": {"from": "*"},
                "action": {"addLabelIds": ["TRASH"], "removeLabelIds": ["INBOX"]}
            })))
            .with_status(200)
            .with_body(r#"{"id": "kill-1"}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        client.create_filter("tok").await.unwrap();
        post.assert_async().await;
    }

    #[tokio::test]
    async fn create_filter_surfaces_post_failure() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body(r#"{"filter": []}"#)
            .create_async()
            .await;
        let _post = server
            .mock("POST", FILTERS_PATH)
            .with_status(400)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.create_filter("tok").await.unwrap_err();
        assert!(matches!(err, ApiError::Http(400)));
    }

    #[tokio::test]
    async fn remove_filter_deletes_each_match_and_only_matches() {
        let mut server = mockito::Server::new_async().await;
        let listing = json!({
            "filter": [
                {"id": "k1", "criteria": {"from": "*"}, "action": {"addLabelIds": ["TRASH"]}},
                {"id": "n1", "criteria": {"from": "a@b.c"}, "action": {"addLabelIds": ["TRASH"]}},
                {"id": "k2", "criteria": {"from": "*"}, "action": {"addLabelIds": ["TRASH", "X"]}},
                {"id": "n2", "criteria": {"from": "*"}, "action": {"addLabelIds": ["STARRED"]}},
                {"id": "k3", "criteria": {"from": "*"}, "action": {"addLabelIds": ["TRASH"]}}
            ]
        })
        .to_string();
        let _list = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body(listing)
            .create_async()
            .await;

        let mut delete_mocks = Vec::new();
        for id in ["k1", "k2", "k3"] {
            delete_mocks.push(
                server
                    .mock("DELETE", format!("{}/{}", FILTERS_PATH, id).as_str())
                    .with_status(204)
                    .expect(1)
                    .create_async()
                    .await,
            );
        }
        for id in ["n1", "n2"] {
            delete_mocks.push(
                server
                    .mock("DELETE", format!("{}/{}", FILTERS_PATH, id).as_str())
                    .with_status(204)
                    .expect(0)
                    .create_async()
                    .await,
            );
        }

        let client = client_for(&server).await;
        client.remove_filter("tok").await.unwrap();
        for mock in delete_mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn remove_filter_aborts_after_first_failing_delete() {
        let mut server = mockito::Server::new_async().await;
        let listing = json!({
            "filter": [
                {"id": "k1", "criteria": {"from": "*"}, "action": {"addLabelIds": ["TRASH"]}},
                {"id": "k2", "criteria": {"from": "*"}, "action": {"addLabelIds": ["TRASH"]}},
                {"id": "k3", "criteria": {"from": "*"}, "action": {"addLabelIds": ["TRASH"]}}
            ]
        })
        .to_string();
        let _list = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body(listing)
            .create_async()
            .await;
        let first = server
            .mock("DELETE", format!("{}/k1", FILTERS_PATH).as_str())
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("DELETE", format!("{}/k2", FILTERS_PATH).as_str())
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("DELETE", format!("{}/k3", FILTERS_PATH).as_str())
            .with_status(204)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.remove_filter("tok").await.unwrap_err();
        assert!(matches!(err, ApiError::Http(500)));
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn remove_filter_succeeds_with_zero_matches() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body(listing_without_kill_filter())
            .create_async()
            .await;

        let client = client_for(&server).await;
        client.remove_filter("tok").await.unwrap();
    }

    #[tokio::test]
    async fn remove_filter_treats_empty_listing_body_as_done() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let client = client_for(&server).await;
        client.remove_filter("tok").await.unwrap();
    }

    #[tokio::test]
    async fn remove_filter_errors_on_garbage_listing() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", FILTERS_PATH)
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.remove_filter("tok").await.unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[tokio::test]
    async fn fetch_userinfo_parses_profile() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/userinfo")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(
                r#"{"sub": "123", "email": "me@example.com", "name": "Me", "picture": "https://p/x.png"}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server).await;
        let user = client.fetch_userinfo("tok").await.unwrap();
        assert_eq!(user.email, "me@example.com");
        assert_eq!(user.name, "Me");
        assert_eq!(user.picture, "https://p/x.png");
    }

    #[tokio::test]
    async fn fetch_userinfo_maps_403_to_authorization_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/userinfo")
            .with_status(403)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_userinfo("tok").await.unwrap_err();
        assert!(matches!(err, ApiError::Authorization(403)));
    }
}

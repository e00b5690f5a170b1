use std::fmt::{Debug, Formatter};

use reqwest::{Method, RequestBuilder};
use url::Url;

use crate::error::StorageError;

/// Just a wrapper around a URL and credentials
#[derive(Clone)]
pub struct Resource {
    url: Url,
    username: String,
    password: String,
}

impl Resource {
    pub fn new(url: Url, username: String, password: String) -> Self {
        Self { url, username, password }
    }

    pub fn url(&self) -> &Url { &self.url }
    pub fn username(&self) -> &String { &self.username }
    pub fn password(&self) -> &String { &self.password }

    /// Build a URL by appending (percent-encoded) path segments to the base URL
    pub fn join_segments(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut built = self.url.clone();
        built.path_segments_mut()
            .map_err(|_| StorageError::InvalidUrl(self.url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(built)
    }

    /// Start a request to `url`, authenticated with the credentials of this resource (if any)
    pub fn request(&self, client: &reqwest::Client, method: Method, url: Url) -> RequestBuilder {
        let builder = client.request(method, url);
        if self.username.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.username, Some(&self.password))
        }
    }
}

impl Debug for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .finish()
    }
}

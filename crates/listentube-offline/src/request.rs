//! Request and response descriptors independent of any HTTP stack

use url::Url;

/// An intercepted request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Upper-case HTTP method
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RequestDescriptor {
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Canonical identity used as the blob-store key: method plus URL
    /// without fragment
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        format!("{} {}", self.method, url)
    }
}

/// A response as stored in, or served from, a tier
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// A complete 2xx representation, the only kind ever cached. A 206 carries
    /// just the requested byte range and must not replace a full body.
    pub fn is_cacheable(&self) -> bool {
        self.is_success() && self.status != 206
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_ignores_fragment() {
        let url = Url::parse("http://localhost:9000/tasks/abc/play?x=1#t=30").unwrap();
        let request = RequestDescriptor::new("get", url);
        assert_eq!(
            request.cache_key(),
            "GET http://localhost:9000/tasks/abc/play?x=1"
        );
    }

    #[test]
    fn test_cache_key_includes_method() {
        let url = Url::parse("http://localhost:9000/tasks").unwrap();
        let get = RequestDescriptor::get(url.clone());
        let post = RequestDescriptor::new("POST", url);
        assert_ne!(get.cache_key(), post.cache_key());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = CachedResponse::new(200, b"x".to_vec()).with_header("Content-Type", "audio/mpeg");
        assert_eq!(response.header("content-type"), Some("audio/mpeg"));
        assert!(response.is_success());
        assert!(!CachedResponse::new(404, Vec::new()).is_success());
    }

    #[test]
    fn test_partial_content_is_not_cacheable() {
        assert!(CachedResponse::new(200, Vec::new()).is_cacheable());
        assert!(CachedResponse::new(204, Vec::new()).is_cacheable());
        assert!(CachedResponse::new(206, Vec::new()).is_success());
        assert!(!CachedResponse::new(206, Vec::new()).is_cacheable());
        assert!(!CachedResponse::new(304, Vec::new()).is_cacheable());
    }
}

//! Transport seam between virtual users and the system under test.
use rampage_core::{Request, Response, TransportError};

/// Sends a single request and hands back the response.
///
/// Implement [`HttpClient`] (the `Send` variant) to drive a load test with a custom transport.
/// Any non-2xx status is still a successful send; only failures to obtain a response at all are
/// [`TransportError`]s.
#[trait_variant::make(HttpClient: Send)]
pub trait LocalHttpClient {
    async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

#[cfg(feature = "http")]
mod reqwest_client {
    use super::HttpClient;
    use rampage_core::{Method, Request, Response, TransportError};
    use std::time::Duration;

    /// [`HttpClient`] backed by a pooled `reqwest::Client`.
    #[derive(Clone, Debug)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new(timeout: Duration) -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| TransportError::Other(e.to_string()))?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        async fn send(&self, request: &Request) -> Result<Response, TransportError> {
            let mut builder = self
                .client
                .request(method(request.method), request.url.clone());

            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let res = builder.send().await.map_err(classify)?;
            let status = res.status().as_u16();
            let body = res.bytes().await.map_err(classify)?;

            Ok(Response {
                status,
                body: body.to_vec(),
            })
        }
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }

    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

#[cfg(feature = "http")]
pub use reqwest_client::ReqwestClient;

//! HTTPS transport for the cloud API

use alloc::vec::Vec;
use core::fmt::Write;

use airmon_core::cloud::{CloudError, RestTransport};
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::TcpClient;
use embassy_time::{Duration, with_timeout};
use log::{debug, warn};
use reqwless::client::HttpClient;
use reqwless::headers::ContentType;
use reqwless::request::{Method, RequestBuilder};

/// Concurrent TCP connections the transport may hold.
pub const TCP_CONNECTIONS: usize = 1;
pub const TCP_BUFFER_SIZE: usize = 4096;
/// Largest TLS record plus overhead.
pub const TLS_BUFFER_SIZE: usize = 16640;
pub const RESPONSE_BUFFER_SIZE: usize = 4096;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub type Tcp<'a> = TcpClient<'a, TCP_CONNECTIONS, TCP_BUFFER_SIZE, TCP_BUFFER_SIZE>;

type AuthHeader = heapless::String<192>;

fn bearer(token: &str) -> Result<AuthHeader, CloudError> {
    let mut header = AuthHeader::new();
    write!(header, "Bearer {}", token).map_err(|_| CloudError::Encode)?;
    Ok(header)
}

fn transport_error(e: reqwless::Error) -> CloudError {
    warn!("HTTP request failed: {:?}", e);
    CloudError::Transport("HTTP request failed")
}

/// [`RestTransport`] over reqwless with TLS.
pub struct HttpsTransport<'a> {
    client: HttpClient<'a, Tcp<'a>, DnsSocket<'a>>,
    rx_buffer: &'a mut [u8],
}

impl<'a> HttpsTransport<'a> {
    pub fn new(client: HttpClient<'a, Tcp<'a>, DnsSocket<'a>>, rx_buffer: &'a mut [u8]) -> Self {
        Self { client, rx_buffer }
    }

    async fn exchange(
        &mut self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&[u8]>,
    ) -> Result<Vec<u8>, CloudError> {
        let auth = bearer(token)?;
        let headers = [("Authorization", auth.as_str())];
        debug!("{:?} {}", method, url);

        let request = with_timeout(REQUEST_TIMEOUT, self.client.request(method, url))
            .await
            .map_err(|_| CloudError::Transport("connect timed out"))?
            .map_err(transport_error)?;
        let mut request = request
            .headers(&headers)
            .content_type(ContentType::ApplicationJson)
            .body(body);

        let response = with_timeout(REQUEST_TIMEOUT, request.send(self.rx_buffer))
            .await
            .map_err(|_| CloudError::Transport("response timed out"))?
            .map_err(transport_error)?;

        if !response.status.is_successful() {
            warn!("HTTP request answered with {:?}", response.status);
            return Err(CloudError::Status(response.status.0));
        }

        let body = with_timeout(REQUEST_TIMEOUT, response.body().read_to_end())
            .await
            .map_err(|_| CloudError::Transport("body timed out"))?
            .map_err(transport_error)?;
        Ok(body.to_vec())
    }
}

impl RestTransport for HttpsTransport<'_> {
    async fn get(&mut self, url: &str, token: &str) -> Result<Vec<u8>, CloudError> {
        self.exchange(Method::GET, url, token, None).await
    }

    async fn post(&mut self, url: &str, token: &str, body: &[u8]) -> Result<(), CloudError> {
        self.exchange(Method::POST, url, token, Some(body))
            .await
            .map(|_| ())
    }
}

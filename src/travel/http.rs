//! Blocking JSON GET on top of ureq

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use serde::de::DeserializeOwned;
use ureq::ErrorKind;

use super::Provider;

/// Transport-level failure, before a tool decides what it means
#[derive(Debug)]
pub(crate) enum FetchError {
    /// Non-2xx response
    Status(u16),
    Timeout,
    Connection,
    /// Anything else: bad body, bad URL, protocol error
    Other(String),
}

pub(crate) fn get_json<T: DeserializeOwned>(
    provider: Provider,
    url: &str,
    query: &[(&str, &str)],
    timeout: Duration,
) -> Result<T, FetchError> {
    // query 里带着密钥，日志只打 URL
    tracing::debug!(%provider, url, "GET");

    let request = query
        .iter()
        .fold(ureq::get(url).timeout(timeout), |req, (k, v)| req.query(k, v));

    match request.call() {
        Ok(response) => response
            .into_json::<T>()
            .map_err(|e| FetchError::Other(e.to_string())),
        Err(ureq::Error::Status(code, _)) => {
            tracing::warn!(%provider, status = code, "upstream returned error status");
            Err(FetchError::Status(code))
        }
        Err(ureq::Error::Transport(transport)) => {
            let message = transport.to_string();
            tracing::warn!(%provider, error = %message, "upstream request failed");
            if is_timeout(&transport) {
                return Err(FetchError::Timeout);
            }
            match transport.kind() {
                ErrorKind::Dns | ErrorKind::ConnectionFailed => Err(FetchError::Connection),
                _ => Err(FetchError::Other(message)),
            }
        }
    }
}

/// Connect and read timeouts both surface as an io::Error in the source chain
fn is_timeout(transport: &ureq::Transport) -> bool {
    let mut source = StdError::source(transport);
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

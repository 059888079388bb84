/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;

use base64::prelude::*;
use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use log::info;
use memchr::memmem;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::RawRelay;
use crate::io::CachedStream;
use crate::relay::{RelayError, RelayResult};

const MAX_UPGRADE_HEAD_SIZE: usize = 4096;
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub fn websocket_accept_key(key: &[u8]) -> String {
    let mut h = Sha1::new();
    h.update(key);
    h.update(WEBSOCKET_GUID.as_bytes());
    BASE64_STANDARD.encode(h.finalize())
}

fn header_has_token(headers: &HeaderMap, name: &HeaderName, token: &str) -> bool {
    headers.get_all(name).iter().any(|v| {
        v.as_bytes()
            .split(|c| *c == b',')
            .any(|t| t.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
    })
}

fn parse_upgrade_request(head: &[u8]) -> Result<HeaderValue, String> {
    let mut lines = head.split(|c| *c == b'\n').map(|l| l.trim_ascii_end());

    let req_line = lines.next().unwrap_or_default();
    let mut parts = req_line.split(|c| *c == b' ').filter(|p| !p.is_empty());
    let method = parts.next().unwrap_or_default();
    if method != Method::GET.as_str().as_bytes() {
        return Err(format!(
            "unsupported method {}",
            String::from_utf8_lossy(method)
        ));
    }
    let _path = parts.next().ok_or("no request path")?;
    match parts.next() {
        Some(b"HTTP/1.1") => {}
        _ => return Err("http version is not 1.1".to_string()),
    }

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let p = memchr::memchr(b':', line).ok_or("invalid header line")?;
        let name = HeaderName::from_bytes(line[..p].trim_ascii())
            .map_err(|e| format!("invalid header name: {e}"))?;
        let value = HeaderValue::from_bytes(line[p + 1..].trim_ascii())
            .map_err(|e| format!("invalid header value: {e}"))?;
        headers.append(name, value);
    }

    if !header_has_token(&headers, &header::UPGRADE, "websocket") {
        return Err("no websocket upgrade header".to_string());
    }
    if !header_has_token(&headers, &header::CONNECTION, "upgrade") {
        return Err("no upgrade in connection header".to_string());
    }
    match headers.get(header::SEC_WEBSOCKET_VERSION) {
        Some(v) if v.as_bytes() == b"13" => {}
        _ => return Err("unsupported websocket version".to_string()),
    }
    headers
        .remove(header::SEC_WEBSOCKET_KEY)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| "no websocket key".to_string())
}

async fn reply_bad_request<S>(stream: &mut S) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let status = StatusCode::BAD_REQUEST;
    let rsp = format!(
        "HTTP/1.1 {} {}\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    stream.write_all(rsp.as_bytes()).await?;
    stream.flush().await
}

/// Accept the websocket upgrade request on the inbound stream.
///
/// Bytes received after the request head are replayed by the returned stream.
pub async fn accept_websocket<S>(mut stream: S) -> RelayResult<CachedStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(1024);
    let head_len = loop {
        if let Some(p) = memmem::find(&buf, b"\r\n\r\n") {
            break p + 4;
        }
        if buf.len() >= MAX_UPGRADE_HEAD_SIZE {
            let _ = reply_bad_request(&mut stream).await;
            return Err(RelayError::UpgradeFailed(
                "request head too large".to_string(),
            ));
        }
        let nr = stream
            .read_buf(&mut buf)
            .await
            .map_err(RelayError::ClientReadFailed)?;
        if nr == 0 {
            return Err(RelayError::UpgradeFailed(
                "connection closed before request end".to_string(),
            ));
        }
    };

    let head = buf.split_to(head_len);
    let key = match parse_upgrade_request(&head) {
        Ok(key) => key,
        Err(e) => {
            let _ = reply_bad_request(&mut stream).await;
            return Err(RelayError::UpgradeFailed(e));
        }
    };

    let rsp = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        websocket_accept_key(key.as_bytes())
    );
    stream
        .write_all(rsp.as_bytes())
        .await
        .map_err(RelayError::ClientWriteFailed)?;
    stream
        .flush()
        .await
        .map_err(RelayError::ClientWriteFailed)?;

    Ok(CachedStream::new(stream, buf))
}

impl RawRelay {
    pub async fn handle_ws_stream<S>(&self, clt: S, client_addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        match accept_websocket(clt).await {
            Ok(s) => {
                self.relay_tunnel(s, client_addr, "ws", self.ws_idle_timeout)
                    .await
            }
            Err(e) => info!(
                "[tun] relay {} ws upgrade from {client_addr} failed: {e}",
                self.label
            ),
        }
    }

    /// The stream should already have its tls layer offloaded.
    pub async fn handle_wss_stream<S>(&self, clt: S, client_addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        match accept_websocket(clt).await {
            Ok(s) => {
                self.relay_tunnel(s, client_addr, "wss", self.ws_idle_timeout)
                    .await
            }
            Err(e) => info!(
                "[tun] relay {} wss upgrade from {client_addr} failed: {e}",
                self.label
            ),
        }
    }
}

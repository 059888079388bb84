/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

mod http;
mod tls;

pub const SNIFF_BUFFER_SIZE: usize = 1024;

pub const PROTOCOL_TLS: &str = "tls";
pub const PROTOCOL_HTTP: &str = "http";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureResult {
    Match,
    NoMatch,
    NeedMoreData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signature {
    TlsClientHello,
    HttpHost,
}

impl Signature {
    pub fn protocol(&self) -> &'static str {
        match self {
            Signature::TlsClientHello => PROTOCOL_TLS,
            Signature::HttpHost => PROTOCOL_HTTP,
        }
    }

    pub fn check(&self, data: &[u8]) -> SignatureResult {
        match self {
            Signature::TlsClientHello => tls::check_client_hello(data),
            Signature::HttpHost => http::check_host(data),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SniffMetadata {
    pub protocol: &'static str,
}

/// Returns `None` if any signature needs more data to decide.
fn check_signatures(data: &[u8], signatures: &[Signature]) -> Option<Option<SniffMetadata>> {
    let mut need_more = false;
    for sig in signatures {
        match sig.check(data) {
            SignatureResult::Match => {
                return Some(Some(SniffMetadata {
                    protocol: sig.protocol(),
                }));
            }
            SignatureResult::NeedMoreData => need_more = true,
            SignatureResult::NoMatch => {}
        }
    }
    if need_more { None } else { Some(None) }
}

async fn read_until_decided<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    signatures: &[Signature],
) -> io::Result<Option<SniffMetadata>>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(r) = check_signatures(buf.as_ref(), signatures) {
            return Ok(r);
        }
        if buf.len() >= SNIFF_BUFFER_SIZE {
            return Ok(None);
        }

        let max_read = SNIFF_BUFFER_SIZE - buf.len();
        let mut limited = (&mut *buf).limit(max_read);
        let nr = reader.read_buf(&mut limited).await?;
        if nr == 0 {
            return Ok(None);
        }
    }
}

/// Read the initial data of `reader` into `buf` until one of the signatures
/// decides.
///
/// All bytes read are left in `buf`, even if an error is returned, so the
/// caller can replay them.
pub async fn peek_stream<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    timeout: Duration,
    signatures: &[Signature],
) -> io::Result<Option<SniffMetadata>>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(timeout, read_until_decided(reader, buf, signatures)).await {
        Ok(r) => r,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "timed out to sniff the initial data",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const ALL: &[Signature] = &[Signature::TlsClientHello, Signature::HttpHost];

    #[tokio::test]
    async fn sniff_http() {
        let mut stream = Builder::new()
            .read(b"GET / HTTP/1.1\r\n")
            .read(b"Host: example.net\r\n\r\n")
            .build();
        let mut buf = BytesMut::new();
        let meta = peek_stream(&mut stream, &mut buf, Duration::from_secs(1), ALL)
            .await
            .unwrap();
        assert_eq!(meta.map(|m| m.protocol), Some(PROTOCOL_HTTP));
        assert_eq!(buf.as_ref(), b"GET / HTTP/1.1\r\nHost: example.net\r\n\r\n");
    }

    #[tokio::test]
    async fn sniff_tls() {
        let mut stream = Builder::new()
            .read(&[0x16, 0x03, 0x01, 0x02, 0x00, 0x01, 0x00, 0x01, 0xfc])
            .build();
        let mut buf = BytesMut::new();
        let meta = peek_stream(&mut stream, &mut buf, Duration::from_secs(1), ALL)
            .await
            .unwrap();
        assert_eq!(meta.map(|m| m.protocol), Some(PROTOCOL_TLS));
        assert_eq!(buf.len(), 9);
    }

    #[tokio::test]
    async fn sniff_unknown() {
        let mut stream = Builder::new().read(b"\x00\x01binary").build();
        let mut buf = BytesMut::new();
        let meta = peek_stream(&mut stream, &mut buf, Duration::from_secs(1), ALL)
            .await
            .unwrap();
        assert!(meta.is_none());
        assert_eq!(buf.as_ref(), b"\x00\x01binary");
    }

    #[tokio::test]
    async fn sniff_eof() {
        let mut stream = Builder::new().read(b"GE").build();
        let mut buf = BytesMut::new();
        let meta = peek_stream(&mut stream, &mut buf, Duration::from_secs(1), ALL)
            .await
            .unwrap();
        assert!(meta.is_none());
        assert_eq!(buf.as_ref(), b"GE");
    }

    #[tokio::test(start_paused = true)]
    async fn sniff_timeout_keeps_data() {
        let mut stream = Builder::new()
            .read(b"POST /")
            .wait(Duration::from_secs(10))
            .read(b" HTTP/1.1\r\n")
            .build();
        let mut buf = BytesMut::new();
        let r = peek_stream(&mut stream, &mut buf, Duration::from_millis(100), ALL).await;
        assert_eq!(r.unwrap_err().kind(), io::ErrorKind::TimedOut);
        assert_eq!(buf.as_ref(), b"POST /");

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b" HTTP/1.1\r\n");
    }
}

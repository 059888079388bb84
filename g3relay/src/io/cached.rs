/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, IoSlice};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes, BytesMut};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pin_project! {
    /// Serve the already read bytes before reading from the inner stream.
    pub struct CachedStream<S> {
        #[pin]
        inner: S,
        cache: Option<Bytes>,
    }
}

impl<S> CachedStream<S> {
    pub fn new(inner: S, cache: BytesMut) -> Self {
        let cache = if cache.is_empty() {
            None
        } else {
            Some(cache.freeze())
        };
        CachedStream { inner, cache }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map(|b| b.len()).unwrap_or_default()
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead> AsyncRead for CachedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();

        if let Some(mut cache) = this.cache.take() {
            let to_read = buf.remaining().min(cache.len());
            buf.put_slice(&cache.chunk()[..to_read]);
            cache.advance(to_read);
            if !cache.is_empty() {
                *this.cache = Some(cache);
            }
            Poll::Ready(Ok(()))
        } else {
            this.inner.poll_read(cx, buf)
        }
    }
}

impl<S: AsyncWrite> AsyncWrite for CachedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.project().inner.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        self.project().inner.poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

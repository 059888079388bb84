/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, IoSlice};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures_util::FutureExt;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Instant, Sleep};

const DEFAULT_SHIFT_MILLIS: u8 = 10;

#[derive(Debug, PartialEq, Eq)]
pub enum StreamLimitAction {
    AdvanceBy(usize),
    DelayFor(u64),
}

/// Fixed window byte limiter, the window size is `1 << shift_millis` ms.
pub struct StreamLimiter {
    shift_millis: u8,
    max_bytes: usize,
    time_slice_id: u64,
    cur_bytes: usize,
}

impl StreamLimiter {
    pub fn new(shift_millis: u8, max_bytes: usize) -> Self {
        StreamLimiter {
            shift_millis,
            max_bytes,
            time_slice_id: 0,
            cur_bytes: 0,
        }
    }

    /// Convert a kilobit per second rate into a limiter using the default window.
    pub fn with_kbps(kbps: u64) -> Self {
        let window_millis = 1u64 << DEFAULT_SHIFT_MILLIS;
        let bytes_per_second = kbps.saturating_mul(1000) / 8;
        let max_bytes = (bytes_per_second.saturating_mul(window_millis) / 1000).max(1);
        StreamLimiter::new(
            DEFAULT_SHIFT_MILLIS,
            usize::try_from(max_bytes).unwrap_or(usize::MAX),
        )
    }

    #[inline]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    #[inline]
    fn slice_id(&self, cur_millis: u64) -> u64 {
        cur_millis >> self.shift_millis
    }

    fn delay(&self, cur_millis: u64) -> u64 {
        ((self.slice_id(cur_millis) + 1) << self.shift_millis) - cur_millis
    }

    pub fn check(&mut self, cur_millis: u64, to_advance: usize) -> StreamLimitAction {
        let time_slice_id = self.slice_id(cur_millis);
        if self.time_slice_id != time_slice_id {
            self.cur_bytes = 0;
            self.time_slice_id = time_slice_id;
        }

        let left = self.max_bytes.saturating_sub(self.cur_bytes);
        if left == 0 {
            StreamLimitAction::DelayFor(self.delay(cur_millis))
        } else {
            StreamLimitAction::AdvanceBy(to_advance.min(left))
        }
    }

    #[inline]
    pub fn set_advance(&mut self, size: usize) {
        self.cur_bytes += size;
    }
}

pin_project! {
    /// Throttle the read side of a stream, the write side is not limited.
    pub struct RateLimitedStream<S> {
        #[pin]
        inner: S,
        limit: StreamLimiter,
        started: Instant,
        delay: Pin<Box<Sleep>>,
    }
}

impl<S> RateLimitedStream<S> {
    pub fn new(inner: S, max_read_rate_kbps: u64) -> Self {
        RateLimitedStream {
            inner,
            limit: StreamLimiter::with_kbps(max_read_rate_kbps),
            started: Instant::now(),
            delay: Box::pin(tokio::time::sleep(Duration::ZERO)),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead> AsyncRead for RateLimitedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut this = self.project();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            let dur_millis = this.started.elapsed().as_millis() as u64;
            match this.limit.check(dur_millis, buf.remaining()) {
                StreamLimitAction::AdvanceBy(len) => {
                    let mut limited_buf = ReadBuf::new(buf.initialize_unfilled_to(len));
                    ready!(this.inner.as_mut().poll_read(cx, &mut limited_buf))?;
                    let nr = limited_buf.filled().len();
                    this.limit.set_advance(nr);
                    buf.advance(nr);
                    return Poll::Ready(Ok(()));
                }
                StreamLimitAction::DelayFor(ms) => {
                    this.delay
                        .as_mut()
                        .reset(*this.started + Duration::from_millis(dur_millis + ms));
                    ready!(this.delay.poll_unpin(cx));
                }
            }
        }
    }
}

impl<S: AsyncWrite> AsyncWrite for RateLimitedStream<S> {
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

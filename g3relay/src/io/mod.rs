/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use tokio::io::{AsyncRead, AsyncWrite};

mod cached;
pub use cached::CachedStream;

mod limit;
pub use limit::{RateLimitedStream, StreamLimitAction, StreamLimiter};

mod udp;
pub use udp::UdpConnStream;

pub trait RelayStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> RelayStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxRelayStream = Box<dyn RelayStream>;

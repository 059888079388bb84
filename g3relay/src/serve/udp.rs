/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::relay::RawRelay;

const UDP_PACKET_BUFFER_SIZE: usize = 65535;

/// Feed the datagrams of each client address into its own udp session.
pub struct UdpRelayListener {
    socket: Arc<UdpSocket>,
    relay: Arc<RawRelay>,
}

impl UdpRelayListener {
    pub async fn bind(addr: SocketAddr, relay: Arc<RawRelay>) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(UdpRelayListener {
            socket: Arc::new(socket),
            relay,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; UDP_PACKET_BUFFER_SIZE];
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                r = self.socket.recv_from(&mut buf) => {
                    match r {
                        Ok((nr, client_addr)) => {
                            self.dispatch(Bytes::copy_from_slice(&buf[..nr]), client_addr);
                        }
                        Err(e) => warn!("relay {}: udp recv: {e:?}", self.relay.label()),
                    }
                }
            }
        }
        info!("relay {}: udp listener stopped", self.relay.label());
    }

    fn dispatch(&self, data: Bytes, client_addr: SocketAddr) {
        let session = self.relay.get_or_create_buffer_ch(client_addr);
        if !session.enqueue(data) {
            debug!(
                "relay {}: udp session {client_addr} queue full, packet dropped",
                self.relay.label()
            );
        }
        if session.mark_handled() {
            let relay = self.relay.clone();
            let socket = self.socket.clone();
            tokio::spawn(async move {
                if let Err(e) = relay.handle_udp_conn(client_addr, socket).await {
                    info!(
                        "relay {}: udp session from {client_addr} error: {e}",
                        relay.label()
                    );
                }
            });
        }
    }
}

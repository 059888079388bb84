/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, info};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::RawRelay;
use crate::relay::{RelayError, RelayResult};
use crate::transport::socket;

const SESSION_QUEUE_SIZE: usize = 1024;
const UDP_RECV_BUFFER_SIZE: usize = 65535;

/// The binding of one client address to its own remote socket.
pub struct UdpSession {
    client_addr: SocketAddr,
    sender: flume::Sender<Bytes>,
    receiver: flume::Receiver<Bytes>,
    handled: AtomicBool,
}

impl UdpSession {
    fn new(client_addr: SocketAddr) -> Self {
        let (sender, receiver) = flume::bounded(SESSION_QUEUE_SIZE);
        UdpSession {
            client_addr,
            sender,
            receiver,
            handled: AtomicBool::new(false),
        }
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    /// Queue one client payload, return false if it is dropped.
    pub fn enqueue(&self, data: Bytes) -> bool {
        self.sender.try_send(data).is_ok()
    }

    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Return true only for the first caller, who should run the session.
    pub fn mark_handled(&self) -> bool {
        !self.handled.swap(true, Ordering::AcqRel)
    }
}

/// Idle deadline shared by both directions of a session.
struct SessionDeadline {
    timeout: Duration,
    at: Mutex<Instant>,
}

impl SessionDeadline {
    fn new(timeout: Duration) -> Self {
        SessionDeadline {
            timeout,
            at: Mutex::new(Instant::now() + timeout),
        }
    }

    fn refresh(&self) {
        *self.at.lock().unwrap() = Instant::now() + self.timeout;
    }

    fn get(&self) -> Instant {
        *self.at.lock().unwrap()
    }
}

impl RawRelay {
    pub fn get_or_create_buffer_ch(&self, client_addr: SocketAddr) -> Arc<UdpSession> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .entry(client_addr.to_string())
            .or_insert_with(|| Arc::new(UdpSession::new(client_addr)))
            .clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Remove the table entry only if it is still this session.
    fn remove_session(&self, session: &Arc<UdpSession>) -> bool {
        let key = session.client_addr.to_string();
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(&key) {
            Some(cur) if Arc::ptr_eq(cur, session) => {
                sessions.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Run the session of `client_addr` until the remote side is idle or broken.
    ///
    /// Replies are sent to the client through `local`.
    pub async fn handle_udp_conn(
        &self,
        client_addr: SocketAddr,
        local: Arc<UdpSocket>,
    ) -> RelayResult<()> {
        let session = self.get_or_create_buffer_ch(client_addr);

        let Some(remote) = self.udp_remotes.next() else {
            self.remove_session(&session);
            return Err(RelayError::NoRemoteAvailable);
        };
        let ups = match socket::connect_udp(&remote.address, self.dial_timeout).await {
            Ok(s) => s,
            Err(e) => {
                self.remove_session(&session);
                return if e.is_resolution_failure() {
                    debug!("[udp] relay {} resolve error: {e}", self.label);
                    Err(RelayError::ResolutionFailure(remote.address.clone()))
                } else {
                    Err(e.into())
                };
            }
        };
        let _gauge = self.metrics.cur_udp_session(&remote.label);
        info!(
            "[udp] relay {} session from {client_addr} to {remote}",
            self.label
        );

        let deadline = SessionDeadline::new(self.udp_idle_timeout);
        let cancel = CancellationToken::new();

        let remote_to_client = async {
            let mut buf = vec![0u8; UDP_RECV_BUFFER_SIZE];
            let mut transferred = 0u64;
            loop {
                let at = deadline.get();
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,
                    r = tokio::time::timeout_at(at, ups.recv(&mut buf)) => {
                        let nr = match r {
                            Ok(Ok(nr)) => nr,
                            Ok(Err(e)) => {
                                debug!("[udp] session {client_addr} remote read error: {e}");
                                break;
                            }
                            Err(_) => {
                                if deadline.get() > at {
                                    continue;
                                }
                                debug!("[udp] session {client_addr} idle timeout");
                                break;
                            }
                        };
                        if let Err(e) = local.send_to(&buf[..nr], client_addr).await {
                            debug!("[udp] session {client_addr} client write error: {e}");
                            break;
                        }
                        transferred += nr as u64;
                        deadline.refresh();
                    }
                }
            }
            cancel.cancel();
            transferred
        };

        // Only the first queued payload is forwarded, later ones are left in the queue.
        let client_to_remote = async {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => 0,
                r = session.receiver.recv_async() => {
                    let Ok(data) = r else {
                        return 0;
                    };
                    match ups.send(&data).await {
                        Ok(nw) => {
                            deadline.refresh();
                            nw as u64
                        }
                        Err(e) => {
                            debug!("[udp] session {client_addr} remote write error: {e}");
                            cancel.cancel();
                            0
                        }
                    }
                }
            }
        };

        let (transferred, sent) = tokio::join!(remote_to_client, client_to_remote);
        self.metrics
            .add_transmitted_bytes(&remote.label, (transferred + sent) * 2);
        self.remove_session(&session);
        drop(ups);
        debug!(
            "[udp] relay {} session from {client_addr} closed",
            self.label
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::lb::RemoteNode;
    use crate::stat::RelayMetrics;

    fn new_relay(remote: &str, idle: Duration) -> (RawRelay, Arc<RelayMetrics>) {
        let mut config = RelayConfig::new("udp-test");
        config.udp_remotes = vec![RemoteNode::new(remote, "udp-remote")];
        let metrics = Arc::new(RelayMetrics::default());
        let mut relay = RawRelay::new(&config, metrics.clone());
        relay.udp_idle_timeout = idle;
        (relay, metrics)
    }

    #[test]
    fn session_per_client_addr() {
        let (relay, _) = new_relay("127.0.0.1:53", Duration::from_secs(1));
        let a1: SocketAddr = "127.0.0.1:10001".parse().unwrap();
        let a2: SocketAddr = "127.0.0.1:10002".parse().unwrap();

        let s1 = relay.get_or_create_buffer_ch(a1);
        let s2 = relay.get_or_create_buffer_ch(a1);
        assert!(Arc::ptr_eq(&s1, &s2));
        assert_eq!(relay.session_count(), 1);
        assert!(s1.mark_handled());
        assert!(!s2.mark_handled());

        let s3 = relay.get_or_create_buffer_ch(a2);
        assert!(!Arc::ptr_eq(&s1, &s3));
        assert_eq!(relay.session_count(), 2);
        assert_eq!(s3.client_addr(), a2);
    }

    #[test]
    fn stale_removal() {
        let (relay, _) = new_relay("127.0.0.1:53", Duration::from_secs(1));
        let addr: SocketAddr = "127.0.0.1:10001".parse().unwrap();

        let old = relay.get_or_create_buffer_ch(addr);
        assert!(relay.remove_session(&old));
        let new = relay.get_or_create_buffer_ch(addr);
        assert!(!relay.remove_session(&old));
        assert_eq!(relay.session_count(), 1);
        assert!(relay.remove_session(&new));
        assert_eq!(relay.session_count(), 0);
    }

    #[test]
    fn enqueue() {
        let session = UdpSession::new("127.0.0.1:10001".parse().unwrap());
        for _ in 0..SESSION_QUEUE_SIZE {
            assert!(session.enqueue(Bytes::from_static(b"x")));
        }
        assert!(!session.enqueue(Bytes::from_static(b"x")));
        assert_eq!(session.queued(), SESSION_QUEUE_SIZE);
    }

    #[tokio::test]
    async fn relay_and_idle_teardown() {
        let remote = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let remote_addr = remote.local_addr().unwrap();
        let (relay, metrics) = new_relay(&remote_addr.to_string(), Duration::from_millis(200));

        let local = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();

        let session = relay.get_or_create_buffer_ch(client_addr);
        assert!(session.enqueue(Bytes::from_static(b"query")));
        assert!(session.enqueue(Bytes::from_static(b"ignored")));

        let remote_task = async {
            let mut buf = [0u8; 64];
            let (nr, peer) = remote.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..nr], b"query");
            remote.send_to(b"answer", peer).await.unwrap();
        };
        let client_task = async {
            let mut buf = [0u8; 64];
            let (nr, from) = client.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..nr], b"answer");
            assert_eq!(from, local.local_addr().unwrap());
            assert_eq!(metrics.cur_udp_session_count("udp-remote"), 1);
        };

        let (r, _, _) = tokio::join!(
            relay.handle_udp_conn(client_addr, local.clone()),
            remote_task,
            client_task
        );
        r.unwrap();
        assert_eq!(relay.session_count(), 0);
        assert_eq!(metrics.cur_udp_session_count("udp-remote"), 0);
        // both legs count twice: query(5) out and answer(6) back
        assert_eq!(metrics.transmitted_bytes("udp-remote"), 22);
    }

    #[tokio::test]
    async fn teardown_keeps_new_session() {
        let remote = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let remote_addr = remote.local_addr().unwrap();
        let (relay, _) = new_relay(&remote_addr.to_string(), Duration::from_millis(100));
        let local = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client_addr: SocketAddr = "127.0.0.1:10003".parse().unwrap();

        let relay = Arc::new(relay);
        let run = {
            let relay = relay.clone();
            let local = local.clone();
            tokio::spawn(async move { relay.handle_udp_conn(client_addr, local).await })
        };

        // the running session gets replaced before it times out
        tokio::time::sleep(Duration::from_millis(20)).await;
        let old = relay.get_or_create_buffer_ch(client_addr);
        assert!(relay.remove_session(&old));
        let new = relay.get_or_create_buffer_ch(client_addr);

        run.await.unwrap().unwrap();
        assert_eq!(relay.session_count(), 1);
        assert!(Arc::ptr_eq(
            &relay.get_or_create_buffer_ch(client_addr),
            &new
        ));
    }

    #[tokio::test]
    async fn resolution_failure() {
        let (relay, metrics) = new_relay("no-port-here", Duration::from_secs(1));
        let local = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client_addr: SocketAddr = "127.0.0.1:10004".parse().unwrap();

        let e = relay
            .handle_udp_conn(client_addr, local)
            .await
            .unwrap_err();
        assert!(matches!(e, RelayError::ResolutionFailure(_)));
        assert_eq!(relay.session_count(), 0);
        assert_eq!(metrics.cur_udp_session_count("udp-remote"), 0);
    }
}

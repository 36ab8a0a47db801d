//! Bidirectional byte pump for one connection

use super::Leg;
use crate::protocol::BUFFER_SIZE;
use crate::tunnel::{TunnelReader, TunnelWriter};
use crate::Error;
use bytes::{Bytes, BytesMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Moves bytes between the two sockets of a connection until either side
/// stops.
///
/// EOF or an error in either direction ends both directions at once, and
/// both streams are dropped when [`StreamRelay::run`] returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamRelay {
    idle_timeout: Option<Duration>,
}

impl StreamRelay {
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self { idle_timeout }
    }

    /// Relay until one side closes. Returns the bytes moved
    /// `(client to peer, peer to client)` counted as plaintext.
    pub async fn run<C, P>(&self, client: C, client_leg: Leg, peer: P, peer_leg: Leg) -> crate::Result<(u64, u64)>
    where
        C: AsyncRead + AsyncWrite + Unpin,
        P: AsyncRead + AsyncWrite + Unpin,
    {
        let (client_read, client_write) = tokio::io::split(client);
        let (peer_read, peer_write) = tokio::io::split(peer);

        let activity = AtomicU64::new(0);
        let sent = AtomicU64::new(0);
        let received = AtomicU64::new(0);

        let upstream = pump(
            LegReader::new(client_read, &client_leg),
            LegWriter::new(peer_write, &peer_leg),
            &activity,
            &sent,
        );
        let downstream = pump(
            LegReader::new(peer_read, &peer_leg),
            LegWriter::new(client_write, &client_leg),
            &activity,
            &received,
        );
        let watchdog = async {
            match self.idle_timeout {
                Some(limit) => idle_watchdog(&activity, limit).await,
                None => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            r = upstream => {
                debug!("Client side finished");
                r
            }
            r = downstream => {
                debug!("Peer side finished");
                r
            }
            _ = watchdog => {
                debug!("Connection idle, closing");
                Err(Error::Timeout)
            }
        };

        result.map(|()| (sent.load(Ordering::Relaxed), received.load(Ordering::Relaxed)))
    }
}

/// Copy chunks from `reader` to `writer` until EOF
async fn pump<R, W>(
    mut reader: LegReader<R>,
    mut writer: LegWriter<W>,
    activity: &AtomicU64,
    counter: &AtomicU64,
) -> crate::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = reader.read_chunk().await? {
        writer.write_chunk(&chunk).await?;
        activity.fetch_add(1, Ordering::Relaxed);
        counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        trace!("Relayed {} bytes", chunk.len());
    }
    Ok(())
}

/// Resolves once a whole `limit` passes without any chunk moving in either
/// direction. Idleness is noticed between one and two periods after the
/// last activity.
async fn idle_watchdog(activity: &AtomicU64, limit: Duration) {
    let mut seen = activity.load(Ordering::Relaxed);
    loop {
        tokio::time::sleep(limit).await;
        let now = activity.load(Ordering::Relaxed);
        if now == seen {
            return;
        }
        seen = now;
    }
}

enum LegReader<R> {
    Plain { inner: R, buf: BytesMut },
    Tunnel(TunnelReader<R>),
}

impl<R: AsyncRead + Unpin> LegReader<R> {
    fn new(inner: R, leg: &Leg) -> Self {
        match leg {
            Leg::Plain => LegReader::Plain {
                inner,
                buf: BytesMut::with_capacity(BUFFER_SIZE),
            },
            Leg::Tunnel(cipher) => LegReader::Tunnel(TunnelReader::new(inner, cipher.clone())),
        }
    }

    /// Next chunk of plaintext, `None` on orderly EOF
    async fn read_chunk(&mut self) -> crate::Result<Option<Bytes>> {
        match self {
            LegReader::Plain { inner, buf } => {
                buf.reserve(BUFFER_SIZE);
                let n = inner.read_buf(buf).await?;
                if n == 0 {
                    return Ok(None);
                }
                Ok(Some(buf.split().freeze()))
            }
            LegReader::Tunnel(reader) => Ok(reader.recv().await?.map(Bytes::from)),
        }
    }
}

enum LegWriter<W> {
    Plain(W),
    Tunnel(TunnelWriter<W>),
}

impl<W: AsyncWrite + Unpin> LegWriter<W> {
    fn new(inner: W, leg: &Leg) -> Self {
        match leg {
            Leg::Plain => LegWriter::Plain(inner),
            Leg::Tunnel(cipher) => LegWriter::Tunnel(TunnelWriter::new(inner, cipher.clone())),
        }
    }

    async fn write_chunk(&mut self, data: &[u8]) -> crate::Result<()> {
        match self {
            LegWriter::Plain(inner) => inner.write_all(data).await?,
            LegWriter::Tunnel(writer) => writer.send(data).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscation::MixCipher;
    use crate::tunnel::{recv_message, send_message};
    use std::sync::Arc;
    use tokio::io::duplex;

    fn cipher() -> Arc<MixCipher> {
        Arc::new(MixCipher::new("qwer1234"))
    }

    #[tokio::test]
    async fn test_plain_to_tunnel() {
        let (client, mut app) = duplex(64 * 1024);
        let (peer, mut far) = duplex(64 * 1024);

        let relay = tokio::spawn(async move {
            StreamRelay::default()
                .run(client, Leg::Plain, peer, Leg::Tunnel(cipher()))
                .await
        });

        app.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let msg = recv_message(&mut far, &cipher()).await.unwrap().unwrap();
        assert_eq!(msg, b"GET / HTTP/1.1\r\n\r\n");

        send_message(&mut far, &cipher(), b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
        let mut buf = vec![0u8; 19];
        app.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, b"HTTP/1.1 200 OK\r\n\r\n");

        drop(app);
        let (sent, received) = relay.await.unwrap().unwrap();
        assert_eq!(sent, 18);
        assert_eq!(received, 19);

        // The peer side is closed together with the client side
        let mut rest = Vec::new();
        far.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_peer_eof_closes_client() {
        let (client, mut app) = duplex(1024);
        let (peer, far) = duplex(1024);

        let relay = tokio::spawn(async move {
            StreamRelay::default()
                .run(client, Leg::Plain, peer, Leg::Plain)
                .await
        });

        drop(far);
        relay.await.unwrap().unwrap();

        let mut rest = Vec::new();
        app.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_tunnel_ends_relay() {
        let (client, _app) = duplex(1024);
        let (peer, mut far) = duplex(1024);

        let relay = tokio::spawn(async move {
            StreamRelay::default()
                .run(client, Leg::Plain, peer, Leg::Tunnel(cipher()))
                .await
        });

        // Header claims 200 payload bytes, then the peer goes away
        far.write_all(&[9, 9, 4, 0, 200, 1, 2, 3]).await.unwrap();
        drop(far);

        let err = relay.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Tunnel(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let (client, _app) = duplex(1024);
        let (peer, _far) = duplex(1024);

        let result = StreamRelay::new(Some(Duration::from_secs(30)))
            .run(client, Leg::Plain, peer, Leg::Plain)
            .await;

        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_way_traffic_keeps_relay_open() {
        let (client, mut app) = duplex(1024);
        let (peer, mut far) = duplex(1024);

        let relay = tokio::spawn(async move {
            StreamRelay::new(Some(Duration::from_secs(10)))
                .run(client, Leg::Plain, peer, Leg::Plain)
                .await
        });

        // Only the client talks, well past the idle limit in total
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(6)).await;
            app.write_all(b"x").await.unwrap();
            let mut byte = [0u8; 1];
            far.read_exact(&mut byte).await.unwrap();
        }
        assert!(!relay.is_finished());

        drop(app);
        let (sent, received) = relay.await.unwrap().unwrap();
        assert_eq!(sent, 4);
        assert_eq!(received, 0);
    }
}

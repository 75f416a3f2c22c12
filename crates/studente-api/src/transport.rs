// Transport primitive underneath the connection manager.
//
// A `Connector` opens one bidirectional, message-framed link. The manager
// never touches sockets directly: it writes `Frame`s into `Link::outbound`
// and reads `TransportEvent`s from `Link::inbound`. The WebSocket connector
// bridges those channels to a tokio-tungstenite stream; tests plug in a
// channel-backed connector instead.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::Error;

// ── Frames & events ──────────────────────────────────────────────────

/// One framed message on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Decode the frame as UTF-8 text. Binary frames carry the same JSON
    /// documents as text frames.
    pub fn into_text(self) -> Result<String, Error> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Binary(bytes) => String::from_utf8(bytes)
                .map_err(|e| Error::WebSocketConnect(format!("binary frame is not UTF-8: {e}"))),
        }
    }

    fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::text(text),
            Self::Binary(bytes) => Message::binary(bytes),
        }
    }
}

/// Something the remote side (or the socket) did.
#[derive(Debug)]
pub enum TransportEvent {
    Frame(Frame),
    /// Orderly or abrupt close. `code` is absent when the stream just ended.
    Closed { code: Option<u16>, reason: String },
    Error(Error),
}

// ── Link ─────────────────────────────────────────────────────────────

/// The manager's half of an open transport.
///
/// Dropping `outbound` closes the underlying socket.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// The socket's half of a [`Link`].
#[derive(Debug)]
pub struct LinkPeer {
    pub outbound: mpsc::UnboundedReceiver<Frame>,
    pub inbound: mpsc::UnboundedSender<TransportEvent>,
}

impl Link {
    /// Create a connected link/peer pair.
    pub fn channel() -> (Self, LinkPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
            },
            LinkPeer {
                outbound: out_rx,
                inbound: in_tx,
            },
        )
    }
}

// ── Connector ────────────────────────────────────────────────────────

/// Host-supplied transport factory.
///
/// `connect` resolves once the link is open (handshake complete) or
/// fails. The returned future must not borrow `self`.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Link, Error>>;
}

impl<C: Connector + ?Sized> Connector for Arc<C> {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Link, Error>> {
        (**self).connect(url)
    }
}

/// Plain WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Link, Error>> {
        let url = url.clone();
        Box::pin(async move {
            tracing::info!(url = %url, "Connecting to WebSocket");

            let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

            tracing::debug!("WebSocket handshake complete");

            let (link, peer) = Link::channel();
            tokio::spawn(pump(ws_stream, peer));
            Ok(link)
        })
    }
}

/// Shuttle frames between a WebSocket stream and a [`LinkPeer`] until
/// either side goes away.
pub async fn pump<S>(ws_stream: WebSocketStream<S>, mut peer: LinkPeer)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            outbound = peer.outbound.recv() => {
                let Some(frame) = outbound else {
                    // Manager dropped the link: close without waiting for the peer.
                    let _ = write.send(Message::Close(None)).await;
                    tracing::debug!("WebSocket link dropped, socket closed");
                    break;
                };
                if let Err(e) = write.send(frame.into_message()).await {
                    let _ = peer
                        .inbound
                        .send(TransportEvent::Error(Error::WebSocketConnect(e.to_string())));
                    break;
                }
            }
            incoming = read.next() => {
                let event = match incoming {
                    Some(Ok(Message::Text(text))) => {
                        TransportEvent::Frame(Frame::Text(text.as_str().to_owned()))
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        TransportEvent::Frame(Frame::Binary(bytes.to_vec()))
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame.map_or((None, String::new()), |cf| {
                            (Some(u16::from(cf.code)), cf.reason.as_str().to_owned())
                        });
                        let _ = peer.inbound.send(TransportEvent::Closed { code, reason });
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong/raw frames -- tungstenite answers pings itself
                        tracing::trace!("WebSocket control frame");
                        continue;
                    }
                    Some(Err(e)) => {
                        let _ = peer
                            .inbound
                            .send(TransportEvent::Error(Error::WebSocketConnect(e.to_string())));
                        break;
                    }
                    None => {
                        let _ = peer.inbound.send(TransportEvent::Closed {
                            code: None,
                            reason: "stream ended".into(),
                        });
                        break;
                    }
                };
                if peer.inbound.send(event).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_frames_decode_as_text() {
        let frame = Frame::Binary(br#"{"type":"PING"}"#.to_vec());
        assert_eq!(frame.into_text().unwrap(), r#"{"type":"PING"}"#);
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        assert!(Frame::Binary(vec![0xff, 0xfe]).into_text().is_err());
    }

    #[tokio::test]
    async fn link_channel_is_connected_both_ways() {
        let (mut link, mut peer) = Link::channel();

        link.outbound.send(Frame::Text("hello".into())).unwrap();
        assert_eq!(peer.outbound.recv().await, Some(Frame::Text("hello".into())));

        peer.inbound
            .send(TransportEvent::Frame(Frame::Text("world".into())))
            .unwrap();
        match link.inbound.recv().await {
            Some(TransportEvent::Frame(Frame::Text(text))) => assert_eq!(text, "world"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropping_link_closes_peer_outbound() {
        let (link, mut peer) = Link::channel();
        drop(link);
        assert_eq!(peer.outbound.recv().await, None);
    }
}

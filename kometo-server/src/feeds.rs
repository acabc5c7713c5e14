use std::{collections::HashMap, sync::Arc};

use axum::extract::ws::Message;
use futures::{channel::mpsc, select, SinkExt, StreamExt};
use kometo_api::{FeedMessage, SessionId};
use tokio::sync::RwLock;

/// Live session feeds, keyed by the id handed out to each client
#[derive(Clone, Debug, Default)]
pub struct SessionFeeds(Arc<RwLock<HashMap<SessionId, mpsc::UnboundedSender<FeedMessage>>>>);

/// Why a session feed stopped
#[derive(Debug)]
enum Closed {
    ByClient,
    UnexpectedMessage,
    SendFailed,
    Dropped,
}

impl SessionFeeds {
    pub fn new() -> SessionFeeds {
        SessionFeeds::default()
    }

    pub async fn num_sessions(&self) -> usize {
        self.0.read().await.len()
    }

    /// Registers a new session and starts relaying feed messages to `write`
    ///
    /// The session lasts until the client closes `read`, sends anything other
    /// than a ping, or a send to `write` fails.
    pub async fn add_session<W, R>(&self, write: W, read: R) -> SessionId
    where
        W: 'static + Send + Unpin + futures::Sink<Message>,
        <W as futures::Sink<Message>>::Error: Send,
        R: 'static + Send + Unpin + futures::Stream<Item = Result<Message, axum::Error>>,
    {
        // Unbounded, as a bounded feed could deadlock the write-lock taken on
        // close against the read-lock held while relaying
        let (sender, receiver) = mpsc::unbounded();
        let session = SessionId::new();

        // The session id must be the first thing the client sees
        let _ = sender.unbounded_send(FeedMessage::Session { id: session });
        self.0.write().await.insert(session, sender);
        tracing::debug!(?session, "session feed opened");

        let this = self.clone();
        tokio::spawn(async move {
            let reason = run_session(session, receiver, write, read).await;
            let remaining = {
                let mut feeds = this.0.write().await;
                feeds.remove(&session);
                feeds.len()
            };
            tracing::debug!(?session, ?reason, remaining, "session feed closed");
        });

        session
    }

    /// Queues `msg` for every live session except `origin`
    ///
    /// This is a no-op if `origin` is not a live session (anymore). Returns
    /// the number of sessions the message was queued for.
    pub async fn relay(&self, origin: SessionId, msg: FeedMessage) -> usize {
        self.relay_all(origin, vec![msg]).await
    }

    /// Same as `relay`, for a batch of messages that peers must see in full
    ///
    /// Liveness of `origin` is checked once, so either the whole batch is
    /// queued for a session or none of it is.
    pub async fn relay_all(&self, origin: SessionId, msgs: Vec<FeedMessage>) -> usize {
        let feeds = self.0.read().await;
        if !feeds.contains_key(&origin) {
            tracing::debug!(?origin, "origin session is not live, dropping change");
            return 0;
        }
        let mut sent = 0;
        for (session, feed) in feeds.iter().filter(|(s, _)| **s != origin) {
            // a closed feed is a session on its way out, it just misses the batch
            if msgs.iter().all(|m| feed.unbounded_send(m.clone()).is_ok()) {
                sent += 1;
            } else {
                tracing::trace!(?session, "feed closed while relaying");
            }
        }
        sent
    }
}

async fn run_session<W, R>(
    session: SessionId,
    mut feed: mpsc::UnboundedReceiver<FeedMessage>,
    mut write: W,
    read: R,
) -> Closed
where
    W: Unpin + futures::Sink<Message>,
    R: Unpin + futures::Stream<Item = Result<Message, axum::Error>>,
{
    let mut read = read.fuse();
    loop {
        let outgoing = select! {
            msg = feed.next() => match msg {
                None => return Closed::Dropped,
                Some(msg) => msg,
            },
            msg = read.next() => match msg {
                None | Some(Ok(Message::Close(_))) => return Closed::ByClient,
                Some(Ok(Message::Text(text))) if text == "ping" => FeedMessage::Pong,
                Some(msg) => {
                    tracing::warn!(?session, ?msg, "unexpected message on session feed");
                    return Closed::UnexpectedMessage;
                }
            },
        };
        let json = match serde_json::to_string(&outgoing) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(?err, msg = ?outgoing, "failed serializing feed message");
                continue;
            }
        };
        if write.send(Message::Text(json)).await.is_err() {
            return Closed::SendFailed;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kometo_api::CommentId;

    use super::*;

    struct FakeClient {
        to_server: mpsc::UnboundedSender<Result<Message, axum::Error>>,
        from_server: mpsc::UnboundedReceiver<Message>,
    }

    impl FakeClient {
        async fn connect(feeds: &SessionFeeds) -> (SessionId, FakeClient) {
            let (to_client, from_server) = mpsc::unbounded();
            let (to_server, from_client) = mpsc::unbounded();
            let session = feeds.add_session(to_client, from_client).await;
            let mut client = FakeClient {
                to_server,
                from_server,
            };
            assert_eq!(
                client.next().await,
                Some(FeedMessage::Session { id: session })
            );
            (session, client)
        }

        async fn next(&mut self) -> Option<FeedMessage> {
            match self.from_server.next().await? {
                Message::Text(json) => Some(serde_json::from_str(&json).expect("parsing feed message")),
                msg => panic!("unexpected message from server: {msg:?}"),
            }
        }

        async fn assert_silent(&mut self) {
            let res = tokio::time::timeout(Duration::from_millis(50), self.from_server.next()).await;
            assert!(res.is_err(), "session received {res:?}");
        }
    }

    async fn wait_for_sessions(feeds: &SessionFeeds, n: usize) {
        let since = std::time::Instant::now();
        while feeds.num_sessions().await != n && since.elapsed() <= Duration::from_secs(1) {
            tokio::task::yield_now().await;
        }
        assert_eq!(feeds.num_sessions().await, n);
    }

    fn deleted(id: &str) -> FeedMessage {
        FeedMessage::CommentDeleted {
            id: CommentId::new(id),
        }
    }

    #[tokio::test]
    async fn changes_skip_their_origin() {
        let feeds = SessionFeeds::new();
        let (a, mut client_a) = FakeClient::connect(&feeds).await;
        let (_, mut client_b) = FakeClient::connect(&feeds).await;
        let (_, mut client_c) = FakeClient::connect(&feeds).await;

        assert_eq!(feeds.relay(a, deleted("1")).await, 2);
        assert_eq!(client_b.next().await, Some(deleted("1")));
        assert_eq!(client_c.next().await, Some(deleted("1")));
        client_a.assert_silent().await;
    }

    #[tokio::test]
    async fn batches_arrive_whole_and_in_order() {
        let feeds = SessionFeeds::new();
        let (a, mut client_a) = FakeClient::connect(&feeds).await;
        let (b, mut client_b) = FakeClient::connect(&feeds).await;

        let batch = vec![deleted("1"), deleted("2"), deleted("3")];
        assert_eq!(feeds.relay_all(a, batch.clone()).await, 1);
        for msg in batch.iter() {
            assert_eq!(client_b.next().await.as_ref(), Some(msg));
        }
        client_a.assert_silent().await;

        // once the origin is gone, no part of a batch goes out
        drop(client_b.to_server);
        wait_for_sessions(&feeds, 1).await;
        assert_eq!(feeds.relay_all(b, batch).await, 0);
        client_a.assert_silent().await;
    }

    #[tokio::test]
    async fn unknown_origin_is_a_no_op() {
        let feeds = SessionFeeds::new();
        let (_, mut client) = FakeClient::connect(&feeds).await;
        assert_eq!(feeds.relay(SessionId::new(), deleted("1")).await, 0);
        client.assert_silent().await;
    }

    #[tokio::test]
    async fn ping_gets_pong() {
        let feeds = SessionFeeds::new();
        let (_, mut client) = FakeClient::connect(&feeds).await;
        client
            .to_server
            .unbounded_send(Ok(Message::Text(String::from("ping"))))
            .unwrap();
        assert_eq!(client.next().await, Some(FeedMessage::Pong));
        assert_eq!(feeds.num_sessions().await, 1);
    }

    #[tokio::test]
    async fn sessions_go_away() {
        let feeds = SessionFeeds::new();
        let (a, client_a) = FakeClient::connect(&feeds).await;
        let (b, mut client_b) = FakeClient::connect(&feeds).await;
        let (_, mut client_c) = FakeClient::connect(&feeds).await;

        // closing the stream ends the session
        drop(client_a.to_server);
        wait_for_sessions(&feeds, 2).await;
        assert_eq!(feeds.relay(a, deleted("1")).await, 0);

        // and so does talking nonsense
        client_b
            .to_server
            .unbounded_send(Ok(Message::Text(String::from("hello"))))
            .unwrap();
        wait_for_sessions(&feeds, 1).await;
        assert_eq!(client_b.next().await, None);
        assert_eq!(feeds.relay(b, deleted("2")).await, 0);
        client_c.assert_silent().await;
    }
}

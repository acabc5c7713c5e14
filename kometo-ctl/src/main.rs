use anyhow::{anyhow, Context};
use futures::StreamExt;
use kometo_api::{
    Comment, CommentEdit, CommentId, CommentList, DeleteComment, FeedMessage, NewComment,
    ReactionChange, ReactionQuery, ReactionSummary, SessionId, User, UserId, UserSearch,
};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base url of the kometo server
    #[structopt(
        short,
        long,
        env = "KOMETO_HOST",
        default_value = "http://127.0.0.1:3005"
    )]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// List all comments
    Comments,

    /// Post a new comment
    Post {
        /// Id of the author
        author: String,

        content: String,

        /// Comment this one answers to, if any
        #[structopt(long)]
        parent: Option<String>,
    },

    /// Replace the contents of a comment
    Edit { id: String, content: String },

    /// Delete a comment along with all the answers to it
    Delete { id: String },

    /// Summarize the reactions on a comment, as seen by a user
    Reactions { comment: String, viewer: String },

    /// Add a reaction to a comment
    React {
        user: String,
        comment: String,
        reaction_char: String,
    },

    /// Remove a reaction from a comment
    Unreact {
        user: String,
        comment: String,
        reaction_char: String,
    },

    /// Show a user
    User { id: String },

    /// List the users whose name contains the filter
    FindUsers { filter: Option<String> },

    /// Print every message of a session feed, one JSON object per line
    Watch,
}

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Session feed, kept open while a write request is in flight
struct Session {
    id: SessionId,
    sock: Socket,
}

impl Session {
    async fn open(host: &str) -> anyhow::Result<Session> {
        let mut sock = connect_feed(host).await?;
        match next_message(&mut sock).await? {
            Some(FeedMessage::Session { id }) => Ok(Session { id, sock }),
            Some(msg) => Err(anyhow!("feed did not start with a session id: {msg:?}")),
            None => Err(anyhow!("feed closed before sending a session id")),
        }
    }

    async fn close(mut self) -> anyhow::Result<()> {
        self.sock
            .close(None)
            .await
            .context("closing session feed")
    }
}

// Only plain websockets are supported, there is no TLS connector
fn feed_url(host: &str) -> anyhow::Result<String> {
    if host.starts_with("https://") {
        return Err(anyhow!(
            "host {host:?} needs TLS, which session feeds do not support"
        ));
    }
    let rest = host
        .strip_prefix("http://")
        .ok_or_else(|| anyhow!("host {host:?} is not an http url"))?;
    Ok(format!("ws://{}/feed", rest.trim_end_matches('/')))
}

async fn connect_feed(host: &str) -> anyhow::Result<Socket> {
    let url = feed_url(host)?;
    let (sock, _) = tokio_tungstenite::connect_async(&url)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    Ok(sock)
}

async fn next_message(sock: &mut Socket) -> anyhow::Result<Option<FeedMessage>> {
    while let Some(msg) = sock.next().await {
        match msg.context("receiving from session feed")? {
            Message::Text(json) => {
                return Ok(Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing feed message {json:?}"))?,
                ))
            }
            Message::Close(_) => return Ok(None),
            _ => (),
        }
    }
    Ok(None)
}

/// Turns server-side errors into their api counterpart
async fn check(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.bytes().await.context("reading error body")?;
    match kometo_api::Error::parse(&body) {
        Ok(err) => Err(err).with_context(|| format!("server answered {status}")),
        Err(_) => Err(anyhow!(
            "server answered {status}: {}",
            String::from_utf8_lossy(&body)
        )),
    }
}

async fn json<T>(req: reqwest::RequestBuilder) -> anyhow::Result<T>
where
    T: for<'de> serde::Deserialize<'de>,
{
    check(req.send().await.context("sending request")?)
        .await?
        .json()
        .await
        .context("parsing server response")
}

fn print<T: serde::Serialize>(val: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = <Opt as structopt::StructOpt>::from_args();
    let host = opt.host.trim_end_matches('/');

    let client = reqwest::Client::new();

    match opt.cmd {
        Command::Comments => {
            let list: CommentList = json(client.get(format!("{host}/comments"))).await?;
            print(&list.comments)?;
        }
        Command::Post {
            author,
            content,
            parent,
        } => {
            let session = Session::open(host).await?;
            let c: Comment = json(client.post(format!("{host}/comments")).json(&NewComment {
                content,
                author_user_id: UserId(author),
                parent_comment_id: parent.map(CommentId),
                origin_session_id: session.id,
            }))
            .await?;
            session.close().await?;
            print(&c)?;
        }
        Command::Edit { id, content } => {
            let session = Session::open(host).await?;
            let c: Comment = json(client.put(format!("{host}/comments")).json(&CommentEdit {
                id: CommentId(id),
                content,
                origin_session_id: session.id,
            }))
            .await?;
            session.close().await?;
            print(&c)?;
        }
        Command::Delete { id } => {
            let session = Session::open(host).await?;
            let removed: Vec<CommentId> =
                json(client.delete(format!("{host}/comments")).query(&DeleteComment {
                    comment_id: CommentId(id),
                    origin_session_id: session.id,
                }))
                .await?;
            session.close().await?;
            print(&removed)?;
        }
        Command::Reactions { comment, viewer } => {
            let summary: Vec<ReactionSummary> =
                json(client.get(format!("{host}/reactions")).query(&ReactionQuery {
                    comment_id: CommentId(comment),
                    user_id: UserId(viewer),
                }))
                .await?;
            print(&summary)?;
        }
        Command::React {
            user,
            comment,
            reaction_char,
        } => {
            let session = Session::open(host).await?;
            let added: bool = json(
                client
                    .post(format!("{host}/reactions"))
                    .json(&ReactionChange {
                        user_id: UserId(user),
                        comment_id: CommentId(comment),
                        reaction_char,
                        origin_session_id: session.id,
                    }),
            )
            .await?;
            session.close().await?;
            if !added {
                eprintln!("no such comment");
            }
        }
        Command::Unreact {
            user,
            comment,
            reaction_char,
        } => {
            let session = Session::open(host).await?;
            let removed: bool = json(
                client
                    .delete(format!("{host}/reactions"))
                    .query(&ReactionChange {
                        user_id: UserId(user),
                        comment_id: CommentId(comment),
                        reaction_char,
                        origin_session_id: session.id,
                    }),
            )
            .await?;
            session.close().await?;
            if !removed {
                eprintln!("no such reaction");
            }
        }
        Command::User { id } => {
            let u: User = json(client.get(format!("{host}/users/{id}"))).await?;
            print(&u)?;
        }
        Command::FindUsers { filter } => {
            let users: Vec<User> =
                json(client.get(format!("{host}/users")).query(&UserSearch {
                    filter_text: filter.unwrap_or_default(),
                }))
                .await?;
            print(&users)?;
        }
        Command::Watch => {
            let mut sock = connect_feed(host).await?;
            while let Some(msg) = next_message(&mut sock).await? {
                println!("{}", serde_json::to_string(&msg)?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_follows_scheme() {
        assert_eq!(
            feed_url("http://127.0.0.1:3005").unwrap(),
            "ws://127.0.0.1:3005/feed"
        );
        assert_eq!(
            feed_url("http://example.org/").unwrap(),
            "ws://example.org/feed"
        );
        let err = feed_url("https://example.org").unwrap_err();
        assert!(err.to_string().contains("TLS"), "got {err}");
        assert!(feed_url("ftp://example.org").is_err());
    }
}

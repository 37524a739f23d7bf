//! Engine.IO v4 / Socket.IO v5 text framing
//!
//! Engine.IO prefixes every frame with a packet type digit:
//! `0` open, `1` close, `2` ping, `3` pong, `4` message. A Socket.IO packet
//! rides inside a `4` frame with its own type digit:
//! `0` connect, `1` disconnect, `2` event, `4` connect error.
//! So `42["notify",{...}]` is an event and `40` a namespace connect.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Client frame joining the default namespace.
pub const CONNECT: &str = "40";
/// Reply to an Engine.IO ping.
pub const PONG: &str = "3";

/// Handshake payload of the `0` open frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

impl OpenInfo {
    /// How long to wait for the next server ping before giving up.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Connected,
    Disconnected,
    ConnectError(Value),
    Event { name: String, data: Value },
    /// Anything this client does not act on, kept for logging.
    Other(String),
}

/// Parse one text frame.
pub fn decode(text: &str) -> Frame {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => match serde_json::from_str(chars.as_str()) {
            Ok(info) => Frame::Open(info),
            Err(_) => Frame::Other(text.to_string()),
        },
        Some('1') => Frame::Close,
        Some('2') => Frame::Ping,
        Some('3') => Frame::Pong,
        Some('4') => {
            decode_message(chars.as_str()).unwrap_or_else(|| Frame::Other(text.to_string()))
        }
        _ => Frame::Other(text.to_string()),
    }
}

fn decode_message(packet: &str) -> Option<Frame> {
    let mut chars = packet.chars();
    let kind = chars.next()?;
    let rest = strip_namespace(chars.as_str());
    match kind {
        '0' => Some(Frame::Connected),
        '1' => Some(Frame::Disconnected),
        '2' => {
            // An optional numeric ack id sits between the type and the array.
            let json = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let mut args: Vec<Value> = serde_json::from_str(json).ok()?;
            if args.is_empty() {
                return None;
            }
            let name = args.remove(0).as_str()?.to_string();
            let data = if args.is_empty() {
                Value::Null
            } else {
                args.remove(0)
            };
            Some(Frame::Event { name, data })
        }
        '4' => Some(Frame::ConnectError(
            serde_json::from_str(rest).unwrap_or(Value::Null),
        )),
        _ => None,
    }
}

/// Drop a `/nsp,` prefix; this client only uses the default namespace.
fn strip_namespace(rest: &str) -> &str {
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(pos) => &rest[pos + 1..],
            None => "",
        }
    } else {
        rest
    }
}

/// Encode a client event as `42["name",data]`.
pub fn encode_event(name: &str, data: &Value) -> String {
    format!("42{}", Value::Array(vec![Value::String(name.to_string()), data.clone()]))
}

/// WebSocket endpoint for an HTTP origin such as `http://127.0.0.1:5000`.
pub fn socket_url(origin: &str) -> anyhow::Result<url::Url> {
    let mut url = url::Url::parse(origin)?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("Cannot use {} as a socket origin", origin))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

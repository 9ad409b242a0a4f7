//! Text framing for the session wire protocol.
//!
//! Every frame is `&`-delimited:
//!
//! ```text
//! outbound   sid=<sessionId>&tok=<token>&tsk=<task>&<key>=<escaped value>&...
//! handshake  sid=<sessionId>&tok=<accessToken>&
//! reply      <instanceId>&<token>
//! inbound    <newToken>&<remainder>
//! reconnect  <newSessionId>&<newAccessToken>   |   refresh
//! ```
//!
//! Field values are escaped by prefixing `\` and `&` with a backslash.

use thiserror::Error;

use crate::{
    id::{AccessToken, ContinuationToken, InstanceId, SessionId},
    reconnect::ReconnectReply,
};

/// Separates segments of a frame.
pub const DELIMITER: char = '&';

/// Escapes the delimiter and itself inside field values.
pub const ESCAPE: char = '\\';

/// Sent by the server when a request carried a stale or unknown token.
pub const INVALID_REQUEST: &str = "invalid_request";

/// Server keep-alive.
pub const PING: &str = "ping";

/// Reply to [`PING`].
pub const PONG: &str = "pong";

/// Reconnect reply asking the client to reload from scratch.
pub const REFRESH: &str = "refresh";

const SESSION_KEY: &str = "sid";
const TOKEN_KEY: &str = "tok";
const TASK_KEY: &str = "tsk";

/// Problems decoding a frame received from the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The frame was empty.
    #[error("empty frame")]
    Empty,

    /// The server rejected the request as invalid.
    #[error("server rejected the request as invalid")]
    InvalidRequest,

    /// The frame has no `&` delimiter.
    #[error("missing delimiter in frame {0:?}")]
    MissingDelimiter(String),

    /// A reply had fewer segments than required.
    #[error("expected at least {expected} segments, got {actual}")]
    TooFewSegments {
        /// Minimum number of segments.
        expected: usize,
        /// Segments actually present.
        actual: usize,
    },
}

/// Escape a field value.
#[must_use]
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == ESCAPE || c == DELIMITER {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Reverse [`escape`]. A backslash takes the following character literally;
/// a trailing lone backslash is kept.
#[must_use]
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push(ESCAPE),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// The first frame sent on a freshly opened transport.
#[must_use]
pub fn handshake(session_id: &SessionId, access_token: &AccessToken) -> String {
    format!(
        "{SESSION_KEY}={}{DELIMITER}{TOKEN_KEY}={}{DELIMITER}",
        session_id.as_str(),
        access_token.as_str()
    )
}

/// Build an outbound task frame carrying the current continuation token.
///
/// Keys are written as given; values are [escaped](escape).
#[must_use]
pub fn outbound(
    session_id: &SessionId,
    token: &ContinuationToken,
    task: &str,
    fields: &[(String, String)],
) -> String {
    let mut frame = format!(
        "{SESSION_KEY}={}{DELIMITER}{TOKEN_KEY}={}{DELIMITER}{TASK_KEY}={task}{DELIMITER}",
        session_id.as_str(),
        token.as_str()
    );
    for (key, value) in fields {
        frame.push_str(key);
        frame.push('=');
        frame.push_str(&escape(value));
        frame.push(DELIMITER);
    }
    frame
}

/// The keep-alive reply, signed with the token that arrived with the ping.
#[must_use]
pub fn pong(session_id: &SessionId, token: &ContinuationToken) -> String {
    outbound(session_id, token, PONG, &[])
}

/// Decode the server's reply to the handshake frame.
///
/// # Errors
///
/// Fails on an empty reply, the invalid-request sentinel, or fewer than two
/// segments.
pub fn parse_handshake_reply(data: &str) -> Result<(InstanceId, ContinuationToken), FrameError> {
    if data.is_empty() {
        return Err(FrameError::Empty);
    }
    if data == INVALID_REQUEST {
        return Err(FrameError::InvalidRequest);
    }

    let mut parts = data.split(DELIMITER);
    match (parts.next(), parts.next()) {
        (Some(instance), Some(token)) => {
            Ok((InstanceId::from(instance), ContinuationToken::from(token)))
        }
        _ => Err(FrameError::TooFewSegments {
            expected: 2,
            actual: 1,
        }),
    }
}

/// A decoded steady-state frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// The server reported a stale or unknown request.
    InvalidRequest,

    /// A token rotation plus an optional payload.
    Frame {
        /// Token to echo on the next outbound frame.
        token: ContinuationToken,

        /// Empty, [`PING`], or an opaque application payload.
        remainder: &'a str,
    },
}

/// Decode a steady-state frame, splitting at the first delimiter.
///
/// # Errors
///
/// [`FrameError::Empty`] for an empty frame and
/// [`FrameError::MissingDelimiter`] when there is no token prefix.
pub fn parse_inbound(data: &str) -> Result<Inbound<'_>, FrameError> {
    if data.is_empty() {
        return Err(FrameError::Empty);
    }
    if data == INVALID_REQUEST {
        return Ok(Inbound::InvalidRequest);
    }

    let (token, remainder) = data
        .split_once(DELIMITER)
        .ok_or_else(|| FrameError::MissingDelimiter(data.to_owned()))?;

    Ok(Inbound::Frame {
        token: ContinuationToken::from(token),
        remainder,
    })
}

/// Decode the body returned by the out-of-band reconnect endpoint.
///
/// # Errors
///
/// Fails when the body is empty or is not `<sessionId>&<accessToken>`.
pub fn parse_reconnect_reply(data: &str) -> Result<ReconnectReply, FrameError> {
    let data = data.trim();
    if data.is_empty() {
        return Err(FrameError::Empty);
    }
    if data == REFRESH {
        return Ok(ReconnectReply::Refresh);
    }

    let mut parts = data.split(DELIMITER);
    match (parts.next(), parts.next()) {
        (Some(session_id), Some(access_token))
            if !session_id.is_empty() && !access_token.is_empty() =>
        {
            Ok(ReconnectReply::Credentials {
                session_id: SessionId::from(session_id),
                access_token: AccessToken::from(access_token),
            })
        }
        (_, None) => Err(FrameError::TooFewSegments {
            expected: 2,
            actual: 1,
        }),
        _ => Err(FrameError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> SessionId {
        SessionId::from("S1")
    }

    #[test]
    fn escape_prefixes_delimiter_and_backslash() {
        assert_eq!(escape(r"a&b\c"), r"a\&b\\c");
        assert_eq!(escape("plain text = fine"), "plain text = fine");
    }

    #[test]
    fn unescape_keeps_trailing_backslash() {
        assert_eq!(unescape(r"abc\"), r"abc\");
        assert_eq!(unescape(r"\&\\x"), r"&\x");
    }

    #[test]
    fn escape_round_trips() {
        bolero::check!().with_type::<String>().for_each(|s| {
            assert_eq!(unescape(&escape(s)), *s);
        });
    }

    #[test]
    fn escaped_values_never_contain_a_bare_delimiter() {
        bolero::check!().with_type::<String>().for_each(|s| {
            let escaped = escape(s);
            let mut prev_escape = false;
            for c in escaped.chars() {
                if c == DELIMITER {
                    assert!(prev_escape);
                }
                prev_escape = c == ESCAPE && !prev_escape;
            }
        });
    }

    #[test]
    fn handshake_frame_carries_identity_only() {
        let frame = handshake(&sid(), &AccessToken::from("T1"));
        assert_eq!(frame, "sid=S1&tok=T1&");
    }

    #[test]
    fn outbound_frame_layout() {
        let fields = vec![
            ("id".to_owned(), "42".to_owned()),
            ("q".to_owned(), "a&b".to_owned()),
        ];
        let frame = outbound(&sid(), &ContinuationToken::from("K1"), "click", &fields);
        assert_eq!(frame, r"sid=S1&tok=K1&tsk=click&id=42&q=a\&b&");
    }

    #[test]
    fn pong_frame() {
        assert_eq!(
            pong(&sid(), &ContinuationToken::from("K2")),
            "sid=S1&tok=K2&tsk=pong&"
        );
    }

    #[test]
    fn handshake_reply_needs_two_segments() {
        assert_eq!(parse_handshake_reply(""), Err(FrameError::Empty));
        assert_eq!(
            parse_handshake_reply(INVALID_REQUEST),
            Err(FrameError::InvalidRequest)
        );
        assert!(matches!(
            parse_handshake_reply("I1"),
            Err(FrameError::TooFewSegments { .. })
        ));

        let (instance, token) = parse_handshake_reply("I1&K1&ignored").expect("valid reply");
        assert_eq!(instance.as_str(), "I1");
        assert_eq!(token.as_str(), "K1");
    }

    #[test]
    fn inbound_splits_on_first_delimiter() {
        assert_eq!(
            parse_inbound("K2&run(a&b)"),
            Ok(Inbound::Frame {
                token: ContinuationToken::from("K2"),
                remainder: "run(a&b)",
            })
        );
        assert_eq!(
            parse_inbound("K3&"),
            Ok(Inbound::Frame {
                token: ContinuationToken::from("K3"),
                remainder: "",
            })
        );
        assert_eq!(parse_inbound(INVALID_REQUEST), Ok(Inbound::InvalidRequest));
        assert_eq!(
            parse_inbound("garbage"),
            Err(FrameError::MissingDelimiter("garbage".to_owned()))
        );
    }

    #[test]
    fn inbound_token_is_everything_before_the_first_delimiter() {
        bolero::check!()
            .with_type::<(String, String)>()
            .for_each(|(token, payload)| {
                let token = token.replace(DELIMITER, "");
                let data = format!("{token}{DELIMITER}{payload}");
                match parse_inbound(&data) {
                    Ok(Inbound::Frame {
                        token: parsed,
                        remainder,
                    }) => {
                        assert_eq!(parsed.as_str(), token);
                        assert_eq!(remainder, payload);
                    }
                    other => panic!("{data:?} decoded as {other:?}"),
                }
            });
    }

    #[test]
    fn reconnect_reply_variants() {
        assert_eq!(parse_reconnect_reply("refresh\n"), Ok(ReconnectReply::Refresh));
        assert_eq!(
            parse_reconnect_reply("S2&T2"),
            Ok(ReconnectReply::Credentials {
                session_id: SessionId::from("S2"),
                access_token: AccessToken::from("T2"),
            })
        );
        assert!(parse_reconnect_reply("S2").is_err());
        assert!(parse_reconnect_reply("&T2").is_err());
        assert!(parse_reconnect_reply("").is_err());
    }
}

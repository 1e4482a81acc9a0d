//! Mapping of command completions to error kinds.

use crate::parser::Payload;
use crate::types::{ResponseCode, Status};
use crate::{Error, ErrorKind};

/// Which kind of command a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The LOGIN command issued while opening a connection.
    Login,
    /// Any other command.
    Command,
}

/// Classifies a tagged completion.
///
/// Returns `None` for `OK`. A `NO` without a response code is only treated
/// as a credential rejection during login; elsewhere it is a plain protocol
/// failure.
#[must_use]
pub const fn classify(
    phase: Phase,
    status: Status,
    code: Option<&ResponseCode>,
) -> Option<ErrorKind> {
    if status.is_ok() {
        return None;
    }

    let kind = match (phase, status, code) {
        (_, _, Some(ResponseCode::Unavailable)) => ErrorKind::Server,
        (
            Phase::Login,
            _,
            Some(ResponseCode::AuthenticationFailed | ResponseCode::Expired),
        )
        | (Phase::Login, Status::No, None) => ErrorKind::AuthenticationFailed,
        _ => ErrorKind::Protocol,
    };
    Some(kind)
}

/// Builds the error for a failed completion, or `None` for `OK`.
pub(crate) fn completion_error(phase: Phase, status: Status, payload: &Payload) -> Option<Error> {
    let alert = payload.alert_text().to_string();
    let code = payload.code.clone();

    match classify(phase, status, code.as_ref())? {
        ErrorKind::Server => Some(Error::Server { alert }),
        ErrorKind::AuthenticationFailed => Some(Error::AuthenticationFailed { alert, code }),
        _ => Some(Error::Protocol { alert, code }),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn unknown(name: &str) -> ResponseCode {
        ResponseCode::Unknown {
            name: name.to_string(),
            args: None,
        }
    }

    #[test]
    fn test_ok_is_not_an_error() {
        for phase in [Phase::Login, Phase::Command] {
            assert_eq!(classify(phase, Status::Ok, None), None);
            assert_eq!(
                classify(phase, Status::Ok, Some(&ResponseCode::Unavailable)),
                None
            );
        }
    }

    #[test]
    fn test_unavailable_is_server_error() {
        for phase in [Phase::Login, Phase::Command] {
            for status in [Status::No, Status::Bad] {
                assert_eq!(
                    classify(phase, status, Some(&ResponseCode::Unavailable)),
                    Some(ErrorKind::Server)
                );
            }
        }
    }

    #[test]
    fn test_login_rejections() {
        let auth = ErrorKind::AuthenticationFailed;
        assert_eq!(
            classify(Phase::Login, Status::No, Some(&ResponseCode::AuthenticationFailed)),
            Some(auth)
        );
        assert_eq!(
            classify(Phase::Login, Status::No, Some(&ResponseCode::Expired)),
            Some(auth)
        );
        assert_eq!(classify(Phase::Login, Status::No, None), Some(auth));
        assert_eq!(
            classify(Phase::Login, Status::Bad, None),
            Some(ErrorKind::Protocol)
        );
        assert_eq!(
            classify(Phase::Login, Status::No, Some(&unknown("SOMEOTHERCODE"))),
            Some(ErrorKind::Protocol)
        );
    }

    #[test]
    fn test_command_phase_is_protocol() {
        assert_eq!(
            classify(Phase::Command, Status::No, None),
            Some(ErrorKind::Protocol)
        );
        assert_eq!(
            classify(
                Phase::Command,
                Status::No,
                Some(&ResponseCode::AuthenticationFailed)
            ),
            Some(ErrorKind::Protocol)
        );
    }

    #[test]
    fn test_completion_error_carries_alert_and_code() {
        let payload = Payload {
            text: "invalid creds".to_string(),
            code: Some(ResponseCode::AuthenticationFailed),
            ..Payload::default()
        };
        let err = completion_error(Phase::Login, Status::No, &payload).unwrap();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(err.alert(), Some("invalid creds"));
        assert_eq!(err.response_code(), Some(&ResponseCode::AuthenticationFailed));

        let payload = Payload {
            text: "try later".to_string(),
            code: Some(ResponseCode::Unavailable),
            ..Payload::default()
        };
        let err = completion_error(Phase::Command, Status::No, &payload).unwrap();
        assert!(matches!(err, Error::Server { ref alert } if alert == "try later"));

        assert!(completion_error(Phase::Command, Status::Ok, &Payload::default()).is_none());
    }
}

//! Response codes.

use super::Capability;

/// Bracketed response code refining the status of a response.
///
/// Code names are matched case-sensitively. Anything not listed here,
/// including a known name in a different case, is kept as
/// [`ResponseCode::Unknown`] so that new server extensions never break
/// parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// AUTHENTICATIONFAILED: Credentials were rejected (RFC 5530).
    AuthenticationFailed,
    /// AUTHORIZATIONFAILED: Authenticated but not allowed to log in (RFC 5530).
    AuthorizationFailed,
    /// EXPIRED: Credentials expired (RFC 5530).
    Expired,
    /// UNAVAILABLE: Temporary server-side failure (RFC 5530).
    Unavailable,
    /// PRIVACYREQUIRED: Operation requires an encrypted channel (RFC 5530).
    PrivacyRequired,
    /// CONTACTADMIN: User should contact the system administrator (RFC 5530).
    ContactAdmin,
    /// NOPERM: Access control denied the operation (RFC 5530).
    NoPerm,
    /// INUSE: Resource is locked by another session (RFC 5530).
    InUse,
    /// SERVERBUG: Server encountered a bug (RFC 5530).
    ServerBug,
    /// CLIENTBUG: Server detected a client bug (RFC 5530).
    ClientBug,
    /// LIMIT: Soft server limit reached (RFC 5530).
    Limit,
    /// OVERQUOTA: Quota exceeded (RFC 5530).
    OverQuota,
    /// ALREADYEXISTS: Target name already exists (RFC 5530).
    AlreadyExists,
    /// NONEXISTENT: Target does not exist (RFC 5530).
    NonExistent,
    /// PARSE: Error parsing message.
    Parse,
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(u32),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(u32),
    /// UNSEEN: First unseen message sequence number.
    Unseen(u32),
    /// CAPABILITY response.
    Capability(Vec<Capability>),
    /// Unrecognized code, kept verbatim.
    Unknown {
        /// Code name as sent by the server.
        name: String,
        /// Raw argument text following the name, if any.
        args: Option<String>,
    },
}

impl ResponseCode {
    /// Builds a response code from its name and raw argument text.
    ///
    /// Known codes with malformed arguments fall back to `Unknown`.
    #[must_use]
    pub fn parse(name: &str, args: Option<&str>) -> Self {
        let number = || args.and_then(|a| a.trim().parse::<u32>().ok());

        let code = match name {
            "ALERT" => Some(Self::Alert),
            "AUTHENTICATIONFAILED" => Some(Self::AuthenticationFailed),
            "AUTHORIZATIONFAILED" => Some(Self::AuthorizationFailed),
            "EXPIRED" => Some(Self::Expired),
            "UNAVAILABLE" => Some(Self::Unavailable),
            "PRIVACYREQUIRED" => Some(Self::PrivacyRequired),
            "CONTACTADMIN" => Some(Self::ContactAdmin),
            "NOPERM" => Some(Self::NoPerm),
            "INUSE" => Some(Self::InUse),
            "SERVERBUG" => Some(Self::ServerBug),
            "CLIENTBUG" => Some(Self::ClientBug),
            "LIMIT" => Some(Self::Limit),
            "OVERQUOTA" => Some(Self::OverQuota),
            "ALREADYEXISTS" => Some(Self::AlreadyExists),
            "NONEXISTENT" => Some(Self::NonExistent),
            "PARSE" => Some(Self::Parse),
            "READ-ONLY" => Some(Self::ReadOnly),
            "READ-WRITE" => Some(Self::ReadWrite),
            "TRYCREATE" => Some(Self::TryCreate),
            "UIDNEXT" => number().map(Self::UidNext),
            "UIDVALIDITY" => number().map(Self::UidValidity),
            "UNSEEN" => number().map(Self::Unseen),
            "CAPABILITY" => Some(Self::Capability(Capability::parse_list(
                args.unwrap_or_default(),
            ))),
            _ => None,
        };

        code.unwrap_or_else(|| Self::Unknown {
            name: name.to_string(),
            args: args.map(str::to_string),
        })
    }

    /// Returns the code name as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Alert => "ALERT",
            Self::AuthenticationFailed => "AUTHENTICATIONFAILED",
            Self::AuthorizationFailed => "AUTHORIZATIONFAILED",
            Self::Expired => "EXPIRED",
            Self::Unavailable => "UNAVAILABLE",
            Self::PrivacyRequired => "PRIVACYREQUIRED",
            Self::ContactAdmin => "CONTACTADMIN",
            Self::NoPerm => "NOPERM",
            Self::InUse => "INUSE",
            Self::ServerBug => "SERVERBUG",
            Self::ClientBug => "CLIENTBUG",
            Self::Limit => "LIMIT",
            Self::OverQuota => "OVERQUOTA",
            Self::AlreadyExists => "ALREADYEXISTS",
            Self::NonExistent => "NONEXISTENT",
            Self::Parse => "PARSE",
            Self::ReadOnly => "READ-ONLY",
            Self::ReadWrite => "READ-WRITE",
            Self::TryCreate => "TRYCREATE",
            Self::UidNext(_) => "UIDNEXT",
            Self::UidValidity(_) => "UIDVALIDITY",
            Self::Unseen(_) => "UNSEEN",
            Self::Capability(_) => "CAPABILITY",
            Self::Unknown { name, .. } => name,
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UidNext(n) | Self::UidValidity(n) | Self::Unseen(n) => {
                write!(f, "{} {n}", self.name())
            }
            Self::Capability(caps) => {
                f.write_str("CAPABILITY")?;
                for cap in caps {
                    write!(f, " {cap}")?;
                }
                Ok(())
            }
            Self::Unknown {
                name,
                args: Some(args),
            } => write!(f, "{name} {args}"),
            _ => f.write_str(self.name()),
        }
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

    #[test]
    fn known_codes() {
        assert_eq!(
            ResponseCode::parse("AUTHENTICATIONFAILED", None),
            ResponseCode::AuthenticationFailed
        );
        assert_eq!(ResponseCode::parse("EXPIRED", None), ResponseCode::Expired);
        assert_eq!(
            ResponseCode::parse("UNAVAILABLE", None),
            ResponseCode::Unavailable
        );
        assert_eq!(ResponseCode::parse("READ-ONLY", None), ResponseCode::ReadOnly);
    }

    #[test]
    fn numeric_codes() {
        assert_eq!(
            ResponseCode::parse("UIDVALIDITY", Some("1234567890")),
            ResponseCode::UidValidity(1234567890)
        );
        assert_eq!(
            ResponseCode::parse("UIDNEXT", Some("oops")),
            ResponseCode::Unknown {
                name: "UIDNEXT".into(),
                args: Some("oops".into())
            }
        );
    }

    #[test]
    fn capability_code() {
        let code = ResponseCode::parse("CAPABILITY", Some("IMAP4rev1 STARTTLS"));
        assert_eq!(
            code,
            ResponseCode::Capability(vec![Capability::Imap4Rev1, Capability::StartTls])
        );
    }

    #[test]
    fn case_sensitive() {
        let code = ResponseCode::parse("authenticationfailed", None);
        assert_eq!(
            code,
            ResponseCode::Unknown {
                name: "authenticationfailed".into(),
                args: None
            }
        );
    }

    #[test]
    fn unknown_preserved() {
        let code = ResponseCode::parse("X-GM-SOMETHING", Some("1 2"));
        assert_eq!(code.name(), "X-GM-SOMETHING");
        assert_eq!(code.to_string(), "X-GM-SOMETHING 1 2");
    }

    #[test]
    fn display() {
        assert_eq!(ResponseCode::UidNext(5).to_string(), "UIDNEXT 5");
        assert_eq!(ResponseCode::Alert.to_string(), "ALERT");
    }
}

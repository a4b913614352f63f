//! Status Dispositions
//!
//! Maps the `status` value of a control envelope to the log level it is
//! reported at and the lifecycle action it triggers.
//!
//! | status         | level | action            |
//! |----------------|-------|-------------------|
//! | `connected`    | debug | -                 |
//! | `auth_success` | debug | mark authenticated|
//! | `auth_failed`  | error | close connection  |
//! | `success`      | debug | -                 |
//! | anything else  | info  | -                 |

/// Severity a status is logged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Routine progress.
    Debug,
    /// Noteworthy but harmless.
    Info,
    /// Failure.
    Error,
}

/// Lifecycle transition requested by a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Server accepted the credentials.
    MarkAuthenticated,
    /// Terminate the connection and stop processing the current batch.
    Close,
}

/// How a status is reported and acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disposition {
    /// Log severity.
    pub level: LogLevel,
    /// Log message.
    pub message: &'static str,
    /// Lifecycle action, if any.
    pub action: Option<LifecycleAction>,
}

/// Status values recognized by the control handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Socket accepted by the server.
    Connected,
    /// Authentication accepted.
    AuthSuccess,
    /// Authentication rejected.
    AuthFailed,
    /// Subscription acknowledged.
    Success,
    /// Anything not listed above.
    Unrecognized,
}

const STATUS_NAMES: &[(&str, Status)] = &[
    ("connected", Status::Connected),
    ("auth_success", Status::AuthSuccess),
    ("auth_failed", Status::AuthFailed),
    ("success", Status::Success),
];

impl Status {
    /// Parse a wire status value. Unknown values map to [`Status::Unrecognized`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        STATUS_NAMES
            .iter()
            .find(|(name, _)| *name == value)
            .map_or(Self::Unrecognized, |(_, status)| *status)
    }

    /// Disposition of this status.
    #[must_use]
    pub const fn disposition(self) -> Disposition {
        match self {
            Self::Connected => Disposition {
                level: LogLevel::Debug,
                message: "connection successful",
                action: None,
            },
            Self::AuthSuccess => Disposition {
                level: LogLevel::Debug,
                message: "authentication successful",
                action: Some(LifecycleAction::MarkAuthenticated),
            },
            Self::AuthFailed => Disposition {
                level: LogLevel::Error,
                message: "authentication failed, closing connection",
                action: Some(LifecycleAction::Close),
            },
            Self::Success => Disposition {
                level: LogLevel::Debug,
                message: "subscription successful",
                action: None,
            },
            Self::Unrecognized => Disposition {
                level: LogLevel::Info,
                message: "unknown status message",
                action: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("connected", LogLevel::Debug, None)]
    #[test_case("auth_success", LogLevel::Debug, Some(LifecycleAction::MarkAuthenticated))]
    #[test_case("auth_failed", LogLevel::Error, Some(LifecycleAction::Close))]
    #[test_case("success", LogLevel::Debug, None)]
    #[test_case("max_connections", LogLevel::Info, None)]
    #[test_case("", LogLevel::Info, None)]
    fn status_table(value: &str, level: LogLevel, action: Option<LifecycleAction>) {
        let disposition = Status::parse(value).disposition();
        assert_eq!(disposition.level, level);
        assert_eq!(disposition.action, action);
    }

    #[test]
    fn status_parse_is_case_sensitive() {
        assert_eq!(Status::parse("AUTH_FAILED"), Status::Unrecognized);
    }

    proptest! {
        #[test]
        fn unlisted_statuses_are_informational(value in "[a-z_]{0,24}") {
            prop_assume!(STATUS_NAMES.iter().all(|(name, _)| *name != value));
            let disposition = Status::parse(&value).disposition();
            prop_assert_eq!(disposition.level, LogLevel::Info);
            prop_assert_eq!(disposition.action, None);
        }
    }
}

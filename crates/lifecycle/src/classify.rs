//! Disconnect classification.
//!
//! | logged out (401) | `device_removed` in payload | decision |
//! |---|---|---|
//! | no | any | [`Decision::Reconnect`] |
//! | yes | yes | [`Decision::TerminateAndPurge`] |
//! | yes | no | [`Decision::Terminate`] |
//!
//! A close without a status code counts as "not logged out". A missing or
//! oddly shaped payload counts as "no marker".

use serde_json::Value;

use crate::event::{DisconnectInfo, DisconnectReason};

/// Payload marker of a device removed from the account.
pub const DEVICE_REMOVED: &str = "device_removed";

/// What to do after a connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Tear the session down and start a new one.
    Reconnect,
    /// Stop; keep the stored state.
    Terminate,
    /// Stop and delete the stored state.
    TerminateAndPurge,
}

impl Decision {
    /// Returns `true` for the decisions that end the controller.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Reconnect)
    }
}

/// Classifies a close.
#[must_use]
pub fn classify(last_disconnect: Option<&DisconnectInfo>) -> Decision {
    let Some(info) = last_disconnect else {
        return Decision::Reconnect;
    };
    if info.reason() != Some(DisconnectReason::LoggedOut) {
        return Decision::Reconnect;
    }
    if info.data.as_ref().is_some_and(is_device_removed) {
        Decision::TerminateAndPurge
    } else {
        Decision::Terminate
    }
}

/// Returns `true` if any `content[*].attrs.type` in `data` is
/// [`DEVICE_REMOVED`].
#[must_use]
pub fn is_device_removed(data: &Value) -> bool {
    data.get("content").and_then(Value::as_array).is_some_and(|items| {
        items.iter().any(|item| {
            item.get("attrs").and_then(|attrs| attrs.get("type")).and_then(Value::as_str)
                == Some(DEVICE_REMOVED)
        })
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn closed(status: Option<u16>, data: Option<Value>) -> DisconnectInfo {
        DisconnectInfo { status_code: status, data }
    }

    fn device_removed() -> Value {
        json!({ "content": [{ "tag": "conflict", "attrs": { "type": "device_removed" } }] })
    }

    #[test]
    fn logged_out_with_device_removed_purges() {
        let info = closed(Some(401), Some(device_removed()));
        assert_eq!(classify(Some(&info)), Decision::TerminateAndPurge);
    }

    #[test]
    fn logged_out_without_marker_terminates() {
        assert_eq!(classify(Some(&closed(Some(401), None))), Decision::Terminate);
        let other = json!({ "content": [{ "attrs": { "type": "replaced" } }] });
        assert_eq!(classify(Some(&closed(Some(401), Some(other)))), Decision::Terminate);
    }

    #[test]
    fn other_codes_reconnect_even_with_marker() {
        for code in [428, 408, 440, 500, 515, 411, 999] {
            let info = closed(Some(code), Some(device_removed()));
            assert_eq!(classify(Some(&info)), Decision::Reconnect, "code {code}");
        }
    }

    #[test]
    fn unclassifiable_closes_reconnect() {
        assert_eq!(classify(None), Decision::Reconnect);
        assert_eq!(classify(Some(&closed(None, Some(device_removed())))), Decision::Reconnect);
    }

    #[test]
    fn malformed_payloads_have_no_marker() {
        for data in [
            json!(null),
            json!("device_removed"),
            json!({ "content": "device_removed" }),
            json!({ "content": [1, null, { "attrs": null }, { "attrs": { "type": 7 } }] }),
            json!({ "content": [{ "type": "device_removed" }] }),
        ] {
            assert!(!is_device_removed(&data), "{data}");
            assert_eq!(classify(Some(&closed(Some(401), Some(data)))), Decision::Terminate);
        }
    }

    #[test]
    fn marker_found_anywhere_in_content() {
        let data = json!({ "content": [{ "attrs": {} }, { "attrs": { "type": "device_removed" } }] });
        assert!(is_device_removed(&data));
    }

    #[test]
    fn terminal_decisions() {
        assert!(!Decision::Reconnect.is_terminal());
        assert!(Decision::Terminate.is_terminal());
        assert!(Decision::TerminateAndPurge.is_terminal());
    }
}

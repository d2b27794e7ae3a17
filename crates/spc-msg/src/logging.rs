//! ---
//! spc_section: "04-messaging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Structured logging for message traffic."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use tracing::debug;

use crate::types::{Message, MessagePayload};
use crate::wire::WireStatusCode;

/// Which way a message crossed the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    /// Published towards the master.
    Outbound,
    /// Received from the master.
    Inbound,
}

impl MessageDirection {
    fn as_str(self) -> &'static str {
        match self {
            MessageDirection::Outbound => "outbound",
            MessageDirection::Inbound => "inbound",
        }
    }
}

/// Fields a log line carries for one payload: the live activity it concerns
/// and the operation or status it reports.
#[derive(Debug, PartialEq, Eq)]
struct TrafficSummary<'a> {
    activity: &'a str,
    subject: String,
}

fn summarize(payload: &MessagePayload) -> TrafficSummary<'_> {
    match payload {
        MessagePayload::ControllerRequest(frame) => TrafficSummary {
            activity: "",
            subject: format!("op {}", frame.operation),
        },
        MessagePayload::ActivityRequest(frame) => TrafficSummary {
            activity: frame.uuid.as_deref().unwrap_or(""),
            subject: format!("op {}", frame.operation),
        },
        MessagePayload::ControllerStatus(frame) => TrafficSummary {
            activity: "",
            subject: format!("{:?}", frame.status),
        },
        MessagePayload::ActivityStatus(frame) => TrafficSummary {
            activity: &frame.uuid,
            subject: format!("{:?}", WireStatusCode::from_code(frame.status)),
        },
    }
}

/// Log one message crossing the transport, keyed by its activity and operation.
pub fn log_message(direction: MessageDirection, message: &Message) {
    let summary = summarize(&message.payload);
    debug!(
        direction = direction.as_str(),
        kind = message.kind(),
        activity = summary.activity,
        subject = %summary.subject,
        message_id = %message.id,
        "controller traffic"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityRequestFrame, ActivityStatusFrame, ControllerStatusFrame};
    use crate::ControllerStatusKind;

    #[test]
    fn activity_traffic_names_the_activity() {
        let request = MessagePayload::ActivityRequest(ActivityRequestFrame {
            operation: 1,
            uuid: Some("abc".into()),
            payload: None,
        });
        let summary = summarize(&request);
        assert_eq!(summary.activity, "abc");
        assert_eq!(summary.subject, "op 1");

        let status = MessagePayload::ActivityStatus(ActivityStatusFrame {
            uuid: "abc".into(),
            status: WireStatusCode::Crashed.code(),
            status_detail: None,
        });
        assert_eq!(summarize(&status).subject, "Crashed");
    }

    #[test]
    fn controller_traffic_reports_status_kind() {
        let heartbeat = MessagePayload::ControllerStatus(ControllerStatusFrame {
            uuid: "ctrl-1".into(),
            status: ControllerStatusKind::Heartbeat,
            data: None,
        });
        let summary = summarize(&heartbeat);
        assert_eq!(summary.activity, "");
        assert_eq!(summary.subject, "Heartbeat");
        log_message(MessageDirection::Outbound, &Message::new(heartbeat));
    }
}

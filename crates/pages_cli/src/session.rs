//! Line protocol served on stdin/stdout.
//!
//! Each input line is one JSON message tagged by `type`; each handled line
//! produces one JSON reply line.

use log::warn;
use pages_api::{ApiRequest, ApiResponse, PagesApiHandler};
use pages_core::{ThingBridge, ThingSweeper};
use serde::{Deserialize, Serialize};

/// Inbound message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Request(ApiRequest),
    ThingAppeared { id: String, title: String },
    ThingDisappeared { id: String },
    /// Runs the reconciliation sweep immediately.
    Reconcile,
}

/// Outbound reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Response(ApiResponse),
    Thing { id: String, changed: bool },
    ThingRemoved { id: String, removed: bool },
    Reconciled { removed: usize },
    Error { message: String },
}

/// Wires one API handler, bridge and sweeper to the line protocol.
pub struct Session {
    api: PagesApiHandler,
    bridge: ThingBridge,
    sweeper: ThingSweeper,
}

impl Session {
    pub fn new(api: PagesApiHandler, bridge: ThingBridge, sweeper: ThingSweeper) -> Self {
        Self {
            api,
            bridge,
            sweeper,
        }
    }

    pub fn sweeper_mut(&mut self) -> &mut ThingSweeper {
        &mut self.sweeper
    }

    /// Handles one input line. Blank lines produce no reply.
    pub fn handle_line(&self, line: &str) -> Option<Reply> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let reply = match serde_json::from_str::<Message>(line) {
            Ok(message) => self.handle_message(message),
            Err(err) => {
                warn!("event=cli_message module=cli status=invalid error={}", err);
                Reply::Error {
                    message: format!("invalid message: {err}"),
                }
            }
        };
        Some(reply)
    }

    pub fn handle_message(&self, message: Message) -> Reply {
        match message {
            Message::Request(request) => Reply::Response(self.api.handle_request(&request)),
            Message::ThingAppeared { id, title } => match self.bridge.thing_appeared(&id, &title) {
                Ok(outcome) => Reply::Thing {
                    id,
                    changed: outcome.changed(),
                },
                Err(err) => failure("thing_appeared", err),
            },
            Message::ThingDisappeared { id } => match self.bridge.thing_disappeared(&id) {
                Ok(removed) => Reply::ThingRemoved { id, removed },
                Err(err) => failure("thing_disappeared", err),
            },
            Message::Reconcile => match self.sweeper.reconcile_now() {
                Ok(removed) => Reply::Reconciled { removed },
                Err(err) => failure("reconcile", err),
            },
        }
    }
}

fn failure(operation: &str, err: impl std::fmt::Display) -> Reply {
    warn!(
        "event=cli_message module=cli status=error operation={} error={}",
        operation, err
    );
    Reply::Error {
        message: format!("{operation} failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::{Reply, Session};
    use pages_api::PagesApiHandler;
    use pages_core::db::open_db_in_memory;
    use pages_core::{share, ActiveThings, DebugChannels, SweepConfig, ThingBridge, ThingSweeper};
    use std::sync::Arc;

    fn session() -> Session {
        let conn = share(open_db_in_memory().unwrap());
        let active = Arc::new(ActiveThings::new());
        Session::new(
            PagesApiHandler::new(Arc::clone(&conn), DebugChannels::default()),
            ThingBridge::new(Arc::clone(&conn), Arc::clone(&active)),
            ThingSweeper::new(conn, active, SweepConfig::default()),
        )
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(session().handle_line("   "), None);
    }

    #[test]
    fn invalid_lines_produce_error_replies() {
        let reply = session().handle_line("{\"type\":\"bogus\"}").unwrap();
        assert!(matches!(reply, Reply::Error { .. }));
    }

    #[test]
    fn thing_notifications_and_requests_share_the_store() {
        let session = session();

        let appeared = session
            .handle_line(r#"{"type":"thing_appeared","id":"dev1","title":"Lamp"}"#)
            .unwrap();
        assert_eq!(
            appeared,
            Reply::Thing {
                id: "dev1".to_string(),
                changed: true
            }
        );

        let Some(Reply::Response(response)) = session.handle_line(
            r#"{"type":"request","method":"POST","path":"/page/add","body":{"name":"Kitchen"}}"#,
        ) else {
            panic!("request must produce a response");
        };
        assert_eq!(response.status, 200);

        let removed = session
            .handle_line(r#"{"type":"thing_disappeared","id":"dev1"}"#)
            .unwrap();
        assert_eq!(
            removed,
            Reply::ThingRemoved {
                id: "dev1".to_string(),
                removed: true
            }
        );

        let reconciled = session.handle_line(r#"{"type":"reconcile"}"#).unwrap();
        assert_eq!(reconciled, Reply::Reconciled { removed: 0 });
    }

    #[test]
    fn replies_are_tagged_json() {
        let line = serde_json::to_string(&Reply::Reconciled { removed: 2 }).unwrap();
        assert_eq!(line, r#"{"type":"reconciled","removed":2}"#);
    }
}

//! Path routing for engine requests.

use crate::body::{
    link_order_updates, non_empty_id, optional_id, required_id, required_str, ApiError,
    ApiRequest, ApiResponse,
};
use log::{debug, error, warn};
use pages_core::{with_pages_service, DebugChannels, PrincipalKind, SharedConnection};
use serde::Serialize;
use serde_json::{json, Value};

/// Every path the handler answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Contents(PrincipalKind),
    Add(PrincipalKind),
    Delete,
    ListAvailable(PrincipalKind),
    Insert,
    DeleteLink,
    UpdateLinkOrder,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        let route = match path {
            "/group" => Self::Contents(PrincipalKind::Group),
            "/page" => Self::Contents(PrincipalKind::Page),
            "/group/add" => Self::Add(PrincipalKind::Group),
            "/page/add" => Self::Add(PrincipalKind::Page),
            "/group/delete" | "/page/delete" => Self::Delete,
            "/group/listavailable" => Self::ListAvailable(PrincipalKind::Group),
            "/page/listavailable" => Self::ListAvailable(PrincipalKind::Page),
            "/group/insert" | "/page/insert" => Self::Insert,
            "/delete_link" => Self::DeleteLink,
            "/update_link_order" => Self::UpdateLinkOrder,
            _ => return None,
        };
        Some(route)
    }
}

/// Dispatches requests against one shared engine connection.
#[derive(Clone)]
pub struct PagesApiHandler {
    conn: SharedConnection,
    debug: DebugChannels,
}

impl PagesApiHandler {
    pub fn new(conn: SharedConnection, debug: DebugChannels) -> Self {
        Self { conn, debug }
    }

    pub fn connection(&self) -> &SharedConnection {
        &self.conn
    }

    /// Handles one request.
    ///
    /// Only `POST` is routed. Rejections such as duplicate names answer
    /// status 200 with JSON `null`.
    pub fn handle_request(&self, request: &ApiRequest) -> ApiResponse {
        let route = if request.method.eq_ignore_ascii_case("POST") {
            Route::from_path(&request.path)
        } else {
            None
        };
        let Some(route) = route else {
            warn!(
                "event=api_request module=api status=no_handler method={} path={}",
                request.method, request.path
            );
            return ApiResponse::text(
                404,
                format!("no handler for {} | {}", request.method, request.path),
            );
        };

        let trace_request = self.traces(request, "request");
        let trace_response = self.traces(request, "response");
        if trace_request {
            debug!(
                "event=api_request module=api status=received method={} path={} body={}",
                request.method, request.path, request.body
            );
        }

        match self.dispatch(route, &request.body) {
            Ok(content) => {
                if trace_response {
                    debug!(
                        "event=api_response module=api status=ok path={} content={}",
                        request.path, content
                    );
                }
                ApiResponse::json(content)
            }
            Err(err) => {
                let status = err.status();
                if status >= 500 {
                    error!(
                        "event=api_request module=api status=error path={} error={}",
                        request.path, err
                    );
                } else {
                    warn!(
                        "event=api_request module=api status=rejected path={} error={}",
                        request.path, err
                    );
                }
                let message = if status >= 500 {
                    format!("request failed: {}", request.path)
                } else {
                    err.to_string()
                };
                ApiResponse::text(status, message)
            }
        }
    }

    fn traces(&self, request: &ApiRequest, channel: &str) -> bool {
        self.debug.is_enabled(channel) || self.debug.is_enabled(&request.path)
    }

    fn dispatch(&self, route: Route, body: &Value) -> Result<String, ApiError> {
        match route {
            Route::Contents(kind) => match non_empty_id(body, "item")? {
                Some(id) => self.run(|service| service.get_contents(id)),
                None => self.run(|service| service.list_by_kind(kind)),
            },
            Route::Add(kind) => {
                let name = required_str(body, "name")?;
                self.run(|service| service.add_principal(kind, name))
            }
            Route::Delete => {
                let id = required_id(body, "item")?;
                self.run(|service| service.delete_principal(id).map(|()| json!({"ok": true})))
            }
            Route::ListAvailable(kind) => {
                let container = required_id(body, "item")?;
                self.run(|service| {
                    Ok(match kind {
                        PrincipalKind::Group => service.list_available_for_group(container),
                        _ => service.list_available_for_page(container),
                    })
                })
            }
            Route::Insert => {
                let container = required_id(body, "container")?;
                let contained = required_id(body, "contained")?;
                let order = optional_id(body, "link_order")?;
                self.run(|service| service.insert_link(container, contained, order))
            }
            Route::DeleteLink => {
                let id = required_id(body, "item")?;
                self.run(|service| service.delete_link(id).map(|()| json!({"ok": true})))
            }
            Route::UpdateLinkOrder => {
                let updates = link_order_updates(body)?;
                self.run(|service| {
                    service
                        .update_link_order(&updates)
                        .map(|updated| json!({ "updated": updated }))
                })
            }
        }
    }

    fn run<T: Serialize>(
        &self,
        op: impl FnOnce(
            &pages_core::PagesService<pages_core::SqlitePagesRepository<'_>>,
        ) -> pages_core::PagesServiceResult<T>,
    ) -> Result<String, ApiError> {
        let value = with_pages_service(&self.conn, op)?;
        Ok(serde_json::to_string(&value)?)
    }
}

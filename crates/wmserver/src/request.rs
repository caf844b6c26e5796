//! Line-oriented request front end
//!
//! Stands in for the transport layer: each request is one JSON object on
//! one line, tagged by `type`. `dispatch` runs it against a [`WindowRoot`]
//! and produces one JSON response line.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::avoid_area::{AvoidArea, AvoidControlOp};
use crate::container::{LayoutMode, PointerAction, PointerEvent};
use crate::display::DisplayId;
use crate::error::WmError;
use crate::geometry::{self, Rect};
use crate::root::WindowRoot;
use crate::window_node::{
    ClientHandle, ModeSupport, SystemBarProperty, WindowFlags, WindowId, WindowInfo, WindowMode, WindowOption,
    WindowType,
};

/// Maximum request line size (64 KB)
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Maximum window name size
const MAX_NAME_SIZE: usize = 256;

/// Largest accepted coordinate magnitude or extent (pixels)
const MAX_COORDINATE: i64 = geometry::MAX_COORDINATE as i64;

/// Request parsing errors
#[derive(Debug, Error)]
pub enum RequestError {
    /// JSON parse error
    #[error("failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Empty line received
    #[error("empty request")]
    EmptyMessage,

    /// Line too large
    #[error("request too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Validation error
    #[error("validation error: {0}")]
    ValidationError(String),
}

/// One inbound request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "create_window")]
    CreateWindow {
        name: String,
        #[serde(default)]
        option: WindowOption,
        /// Owning client, if the window should die with it
        #[serde(default)]
        client: Option<ClientHandle>,
    },
    #[serde(rename = "destroy")]
    Destroy { window_id: WindowId },
    #[serde(rename = "show")]
    Show { window_id: WindowId },
    #[serde(rename = "hide")]
    Hide { window_id: WindowId },
    #[serde(rename = "move_to")]
    MoveTo { window_id: WindowId, x: i32, y: i32 },
    #[serde(rename = "resize")]
    Resize { window_id: WindowId, width: u32, height: u32 },
    #[serde(rename = "set_window_mode")]
    SetWindowMode { window_id: WindowId, mode: WindowMode },
    #[serde(rename = "set_mode_support")]
    SetModeSupport { window_id: WindowId, mask: ModeSupport },
    #[serde(rename = "set_window_flags")]
    SetWindowFlags { window_id: WindowId, flags: WindowFlags },
    #[serde(rename = "request_focus")]
    RequestFocus { window_id: WindowId },
    #[serde(rename = "pointer")]
    Pointer {
        window_id: WindowId,
        action: PointerAction,
        x: i32,
        y: i32,
    },
    #[serde(rename = "avoid_control")]
    AvoidControl { window_id: WindowId, op: AvoidControlOp },
    #[serde(rename = "set_layout_mode")]
    SetLayoutMode { display_id: DisplayId, mode: LayoutMode },
    #[serde(rename = "set_starting_window_shown")]
    SetStartingWindowShown { window_id: WindowId, shown: bool },
    #[serde(rename = "set_system_bar_property")]
    SetSystemBarProperty {
        window_id: WindowId,
        bar_type: WindowType,
        prop: SystemBarProperty,
    },
    #[serde(rename = "minimize_all")]
    MinimizeAll { display_id: DisplayId },
    /// The transport noticed a client disconnect
    #[serde(rename = "client_died")]
    ClientDied { client: ClientHandle },
    #[serde(rename = "display_changed")]
    DisplayChanged { display_id: DisplayId },
    #[serde(rename = "display_removed")]
    DisplayRemoved { display_id: DisplayId },
    /// Query one window (for testing/debugging)
    #[serde(rename = "query_window")]
    QueryWindow { window_id: WindowId },
    /// Query stacking order of a display (for testing/debugging)
    #[serde(rename = "query_z_order")]
    QueryZOrder { display_id: DisplayId },
    #[serde(rename = "query_avoid_area")]
    QueryAvoidArea { display_id: DisplayId },
    #[serde(rename = "check_invariants")]
    CheckInvariants,
}

/// Reply to one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Created { window_id: WindowId },
    Window { info: WindowInfo },
    ZOrder { windows: Vec<WindowId> },
    AvoidArea { areas: Vec<AvoidArea> },
    Count { count: usize },
    Error { kind: String, message: String },
}

impl From<WmError> for Response {
    fn from(e: WmError) -> Self {
        Response::Error {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

impl From<Result<(), WmError>> for Response {
    fn from(result: Result<(), WmError>) -> Self {
        match result {
            Ok(()) => Response::Ok,
            Err(e) => e.into(),
        }
    }
}

/// Parse and validate one request line
///
/// # Errors
///
/// Returns `RequestError::EmptyMessage` for blank lines,
/// `RequestError::MessageTooLarge` above [`MAX_REQUEST_SIZE`],
/// `RequestError::ParseError` for malformed JSON and
/// `RequestError::ValidationError` for out-of-range fields.
pub fn parse_request(line: &str) -> Result<Request, RequestError> {
    if line.trim().is_empty() {
        return Err(RequestError::EmptyMessage);
    }

    // Check size before parsing
    if line.len() > MAX_REQUEST_SIZE {
        return Err(RequestError::MessageTooLarge {
            size: line.len(),
            max: MAX_REQUEST_SIZE,
        });
    }

    let request: Request = serde_json::from_str(line)?;
    validate(&request)?;

    tracing::debug!(?request, "request parsed");
    Ok(request)
}

fn check_range(what: &str, value: i64) -> Result<(), RequestError> {
    if value.abs() > MAX_COORDINATE {
        return Err(RequestError::ValidationError(format!(
            "{} out of range: {} (max {})",
            what, value, MAX_COORDINATE
        )));
    }
    Ok(())
}

fn check_rect(rect: &Rect) -> Result<(), RequestError> {
    check_range("x", rect.x.into())?;
    check_range("y", rect.y.into())?;
    check_range("width", rect.width.into())?;
    check_range("height", rect.height.into())
}

/// Reject values the geometry code cannot handle without overflow
fn validate(request: &Request) -> Result<(), RequestError> {
    match request {
        Request::CreateWindow { name, option, .. } => {
            if name.len() > MAX_NAME_SIZE {
                return Err(RequestError::ValidationError(format!(
                    "window name too large: {} bytes (max {})",
                    name.len(),
                    MAX_NAME_SIZE
                )));
            }
            check_rect(&option.rect)
        }
        Request::MoveTo { x, y, .. } | Request::Pointer { x, y, .. } => {
            check_range("x", (*x).into())?;
            check_range("y", (*y).into())
        }
        Request::Resize { width, height, .. } => {
            check_range("width", (*width).into())?;
            check_range("height", (*height).into())
        }
        _ => Ok(()),
    }
}

/// Run one request against the root
pub fn dispatch(root: &WindowRoot, request: Request) -> Response {
    match request {
        Request::CreateWindow { name, option, client } => match root.create_window(&name, option, client) {
            Ok(window_id) => Response::Created { window_id },
            Err(e) => e.into(),
        },
        Request::Destroy { window_id } => root.destroy_window(window_id).into(),
        Request::Show { window_id } => root.show_window(window_id).into(),
        Request::Hide { window_id } => root.hide_window(window_id).into(),
        Request::MoveTo { window_id, x, y } => root.move_to(window_id, x, y).into(),
        Request::Resize { window_id, width, height } => root.resize(window_id, width, height).into(),
        Request::SetWindowMode { window_id, mode } => root.set_window_mode(window_id, mode).into(),
        Request::SetModeSupport { window_id, mask } => root.set_mode_support_info(window_id, mask).into(),
        Request::SetWindowFlags { window_id, flags } => root.set_window_flags(window_id, flags).into(),
        Request::RequestFocus { window_id } => root.request_focus(window_id).into(),
        Request::Pointer { window_id, action, x, y } => root
            .consume_pointer_event(window_id, PointerEvent::new(action, x, y))
            .into(),
        Request::AvoidControl { window_id, op } => root.avoid_control(window_id, op).into(),
        Request::SetLayoutMode { display_id, mode } => root.set_layout_mode(display_id, mode).into(),
        Request::SetStartingWindowShown { window_id, shown } => {
            root.set_starting_window_shown(window_id, shown).into()
        }
        Request::SetSystemBarProperty { window_id, bar_type, prop } => {
            root.set_system_bar_property(window_id, bar_type, prop).into()
        }
        Request::MinimizeAll { display_id } => match root.minimize_all(display_id) {
            Ok(count) => Response::Count { count },
            Err(e) => e.into(),
        },
        Request::ClientDied { client } => Response::Count {
            count: root.handle_client_death(client),
        },
        Request::DisplayChanged { display_id } => root.notify_display_changed(display_id).into(),
        Request::DisplayRemoved { display_id } => Response::Count {
            count: root.notify_display_removed(display_id),
        },
        Request::QueryWindow { window_id } => match root.window_info(window_id) {
            Ok(info) => Response::Window { info },
            Err(e) => e.into(),
        },
        Request::QueryZOrder { display_id } => Response::ZOrder {
            windows: root.z_order(display_id),
        },
        Request::QueryAvoidArea { display_id } => Response::AvoidArea {
            areas: root.get_avoid_area(display_id),
        },
        Request::CheckInvariants => match root.check_invariants() {
            Ok(()) => Response::Ok,
            Err(message) => Response::Error {
                kind: "invariant".to_string(),
                message,
            },
        },
    }
}

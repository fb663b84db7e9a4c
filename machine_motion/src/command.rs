use std::fmt;

pub const READY_TRUE: &str = "Ready = true";
pub const READY_FALSE: &str = "Ready = false";
pub const BUSY_TRUE: &str = "Busy = true";
pub const BUSY_FALSE: &str = "Busy = false";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerCommand {
    IsReady,
    IsBusy,
    MoveAbsolute { axis: u32, position_mm: f64 },
}

impl ControllerCommand {
    /// Command text as sent to the controller, before line framing.
    pub fn encode(&self) -> String {
        match self {
            ControllerCommand::IsReady => "isReady;".to_string(),
            ControllerCommand::IsBusy => "isBusy;".to_string(),
            ControllerCommand::MoveAbsolute { axis, position_mm } => {
                format!("SET im_move_abs_{}/{}/", axis, format_position(*position_mm))
            }
        }
    }
}

/// Shortest decimal that parses back to the same `f64`, never in exponent
/// form, with a trailing `.0` on integral values.
fn format_position(position_mm: f64) -> String {
    let text = position_mm.to_string();
    if position_mm.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

impl fmt::Display for ControllerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// The controller's reply format is loose, so readiness is a substring match.
/// Anything else, including an empty line, reads as not ready.
pub fn decode_ready(response: &str) -> bool {
    response.contains(READY_TRUE)
}

pub fn decode_busy(response: &str) -> bool {
    response.contains(BUSY_TRUE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ack(String),
    ReadyState(bool),
    BusyState(bool),
    Unrecognized(String),
}

impl Response {
    pub fn parse(command: &ControllerCommand, line: &str) -> Self {
        match command {
            ControllerCommand::IsReady if decode_ready(line) => Response::ReadyState(true),
            ControllerCommand::IsReady if line.contains(READY_FALSE) => Response::ReadyState(false),
            ControllerCommand::IsBusy if decode_busy(line) => Response::BusyState(true),
            ControllerCommand::IsBusy if line.contains(BUSY_FALSE) => Response::BusyState(false),
            ControllerCommand::MoveAbsolute { .. } if !line.is_empty() => {
                Response::Ack(line.to_string())
            }
            _ => Response::Unrecognized(line.to_string()),
        }
    }
}

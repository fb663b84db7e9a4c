use crate::models::MotionRequest;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntakeCommand {
    Move(MotionRequest),
    GetState,
}

/// Parses `move:<axis>:<position_mm>`, `move:<position_mm>` or `get:state`.
pub fn parse_command(cmd_str: &str, default_axis: u32) -> Option<IntakeCommand> {
    let parts: Vec<&str> = cmd_str.trim().split(':').map(str::trim).collect();
    if parts.len() < 2 {
        return None;
    }

    let command = match parts[0] {
        "move" => {
            let (axis, position) = match parts.len() {
                2 => (default_axis, parts[1]),
                3 => (parts[1].parse::<u32>().ok()?, parts[2]),
                _ => return None,
            };
            let position = position.parse::<f64>().ok().filter(|p| p.is_finite())?;

            IntakeCommand::Move(MotionRequest::new(axis, position))
        }
        "get" => {
            if parts.len() != 2 || parts[1] != "state" {
                return None;
            }

            IntakeCommand::GetState
        }
        _ => return None,
    };

    Some(command)
}

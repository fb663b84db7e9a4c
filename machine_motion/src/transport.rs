use std::io::{self, Read, Write};

pub const RESPONSE_BUFFER_SIZE: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("timed out waiting for controller response")]
    Timeout,
    #[error("connection closed by controller")]
    Closed,
    #[error("failed to write command: {0}")]
    WriteFailed(#[source] io::Error),
    #[error("failed to read response: {0}")]
    Io(#[source] io::Error),
}

impl TransportError {
    /// A closed connection is never reopened, so no later command can succeed.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

fn write_error(e: io::Error) -> TransportError {
    if is_disconnect(e.kind()) {
        TransportError::Closed
    } else {
        TransportError::WriteFailed(e)
    }
}

fn read_error(e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
        kind if is_disconnect(kind) => TransportError::Closed,
        _ => TransportError::Io(e),
    }
}

/// Normalizes a command so it ends with exactly one `;`.
pub fn frame_command(command: &str) -> String {
    format!("{};", command.trim().trim_end_matches(';'))
}

/// Sends one command line and reads back the single response to it.
///
/// The response is whatever arrives in one read of up to
/// [`RESPONSE_BUFFER_SIZE`] bytes, decoded lossily and trimmed.
pub fn send_command(
    sender: &mut (impl Write + Read),
    command: &str,
) -> Result<String, TransportError> {
    let framed = frame_command(command);

    let mut payload = framed.clone().into_bytes();
    payload.push(b'\n');

    sender.write_all(&payload).map_err(write_error)?;
    sender.flush().map_err(write_error)?;

    let mut buffer = [0u8; RESPONSE_BUFFER_SIZE];
    let n = sender.read(&mut buffer).map_err(read_error)?;
    if n == 0 {
        return Err(TransportError::Closed);
    }

    let response = String::from_utf8_lossy(&buffer[..n]).trim().to_string();
    tracing::info!("Sent: {} | Received: {}", framed, response);

    Ok(response)
}

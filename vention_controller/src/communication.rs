use std::path::Path;

use anyhow::{Result, anyhow};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{
    commands::{IntakeCommand, parse_command},
    controller::controller_service::MotionHandle,
    models::MotionOutcome,
};

pub async fn handle_line(line: &str, handle: &MotionHandle, default_axis: u32) -> String {
    match parse_command(line, default_axis) {
        Some(IntakeCommand::Move(request)) => match handle.move_to(request).await {
            Ok(MotionOutcome::Completed) => "OK\n".to_string(),
            Ok(MotionOutcome::SkippedNotReady) => "Skipped: controller not ready\n".to_string(),
            Ok(MotionOutcome::TransportFailed(reason)) => format!("Error: {}\n", reason),
            Err(e) => format!("Error: {}\n", e),
        },
        Some(IntakeCommand::GetState) => format!("State: {:?}\n", handle.state()),
        None => "Error: Invalid command format\n".to_string(),
    }
}

/// Accepts position requests on a Unix socket, one command per read.
pub async fn run_communication_layer(
    socket_path: &Path,
    handle: MotionHandle,
    default_axis: u32,
) -> Result<()> {
    // Remove existing socket file if it exists to prevent "Address already in use" error
    if socket_path.exists() {
        std::fs::remove_file(socket_path)
            .map_err(|e| anyhow!("Failed to remove existing socket file: {}", e))?;
    }

    let listener = tokio::net::UnixListener::bind(socket_path)
        .map_err(|e| anyhow!("Failed to bind to socket: {}", e))?;

    tracing::info!(
        "Ready to receive axis position commands on {}",
        socket_path.display()
    );

    loop {
        let (mut socket, _) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("Failed to accept connection: {}", e))?;

        let handle = handle.clone();

        tokio::spawn(async move {
            let mut buffer = [0; 1024];

            loop {
                match socket.read(&mut buffer).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let command_str = String::from_utf8_lossy(&buffer[..n]);
                        let reply = handle_line(&command_str, &handle, default_axis).await;

                        if socket.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Error reading from socket: {}", e);
                        break;
                    }
                }
            }
        });
    }
}

use std::io::{Read, Write};

pub mod command;
pub mod endpoint;
pub mod transport;

pub use command::{ControllerCommand, Response, decode_busy, decode_ready};
pub use endpoint::{ConnectError, ControllerEndpoint, connect};
pub use transport::{TransportError, send_command};

/// Vention MachineMotion controller speaking the `isReady` / `isBusy` /
/// `im_move_abs` text protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct MachineMotion;

impl MachineMotion {
    pub fn new() -> Self {
        MachineMotion
    }

    pub fn execute(
        &self,
        sender: &mut (impl Write + Read),
        command: &ControllerCommand,
    ) -> Result<Response, TransportError> {
        let line = send_command(sender, &command.encode())?;
        Ok(Response::parse(command, &line))
    }

    pub fn is_ready(&self, sender: &mut (impl Write + Read)) -> Result<bool, TransportError> {
        send_command(sender, &ControllerCommand::IsReady.encode()).map(|r| decode_ready(&r))
    }

    pub fn is_busy(&self, sender: &mut (impl Write + Read)) -> Result<bool, TransportError> {
        send_command(sender, &ControllerCommand::IsBusy.encode()).map(|r| decode_busy(&r))
    }

    pub fn move_absolute(
        &self,
        sender: &mut (impl Write + Read),
        axis: u32,
        position_mm: f64,
    ) -> Result<Response, TransportError> {
        self.execute(sender, &ControllerCommand::MoveAbsolute { axis, position_mm })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::ScriptedStream;

    #[test]
    fn queries_ready_and_busy() {
        let mut stream = ScriptedStream::replying(&["Ready = true", "Busy = false"]);
        let controller = MachineMotion::new();

        assert!(controller.is_ready(&mut stream).unwrap());
        assert!(!controller.is_busy(&mut stream).unwrap());
        assert_eq!(stream.written_lines(), vec!["isReady;", "isBusy;"]);
    }

    #[test]
    fn sends_absolute_move() {
        let mut stream = ScriptedStream::replying(&["ok"]);

        let response = MachineMotion::new()
            .move_absolute(&mut stream, 1, 100.0)
            .unwrap();

        assert_eq!(response, Response::Ack("ok".to_string()));
        assert_eq!(stream.written_lines(), vec!["SET im_move_abs_1/100.0/;"]);
    }

    #[test]
    fn talks_to_controller_over_tcp() {
        use std::io::BufRead;
        use std::net::TcpListener;
        use utilities::tcp_channel::ChannelTimeouts;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let controller_side = std::thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let mut reader = std::io::BufReader::new(socket.try_clone().unwrap());
            let mut writer = socket;
            let mut received = Vec::new();

            for reply in ["Ready = true\n", "Busy = true\n"] {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                received.push(line);
                writer.write_all(reply.as_bytes()).unwrap();
            }
            received
        });

        let mut channel = connect(
            &ControllerEndpoint::new("127.0.0.1", port),
            ChannelTimeouts::default(),
        )
        .unwrap();
        let controller = MachineMotion::new();

        assert!(controller.is_ready(&mut channel).unwrap());
        assert!(controller.is_busy(&mut channel).unwrap());

        assert_eq!(
            controller_side.join().unwrap(),
            vec!["isReady;\n", "isBusy;\n"]
        );
    }
}

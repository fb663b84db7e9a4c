use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
}

impl Default for ChannelTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            read: Duration::from_secs(2),
            write: Duration::from_secs(2),
        }
    }
}

/// A TCP stream that is connected once, up front, and never reconnected.
///
/// After the peer closes the session (or [`TcpChannel::close`] is called) every
/// read and write fails with [`io::ErrorKind::NotConnected`].
#[derive(Debug)]
pub struct TcpChannel {
    addr: SocketAddr,
    stream: Option<TcpStream>,
}

impl TcpChannel {
    pub fn connect(addr: SocketAddr, timeouts: ChannelTimeouts) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeouts.connect)?;

        stream.set_read_timeout(Some(timeouts.read))?;
        stream.set_write_timeout(Some(timeouts.write))?;
        stream.set_nodelay(true)?;
        stream.set_nonblocking(false)?;

        Ok(Self {
            addr,
            stream: Some(stream),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotConnected,
                format!("connection to {} is closed", self.addr),
            )
        })
    }

    fn drop_on_disconnect(&mut self, e: &io::Error) {
        if matches!(
            e.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
        ) {
            self.close();
        }
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream()?.read(buf) {
            // A zero-length read on a non-empty buffer is an orderly peer close.
            Ok(0) if !buf.is_empty() => {
                self.close();
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.drop_on_disconnect(&e);
                Err(e)
            }
        }
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stream()?.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.drop_on_disconnect(&e);
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream()?.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn short_timeouts() -> ChannelTimeouts {
        ChannelTimeouts {
            connect: Duration::from_millis(500),
            read: Duration::from_millis(200),
            write: Duration::from_millis(200),
        }
    }

    #[test]
    fn exchanges_bytes_with_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 16];
            let n = socket.read(&mut buf).unwrap();
            socket.write_all(&buf[..n]).unwrap();
        });

        let mut channel = TcpChannel::connect(addr, short_timeouts()).unwrap();
        channel.write_all(b"ping").unwrap();

        let mut buf = [0u8; 16];
        let n = channel.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(channel.peer_addr(), addr);

        peer.join().unwrap();
    }

    #[test]
    fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(TcpChannel::connect(addr, short_timeouts()).is_err());
    }

    #[test]
    fn read_times_out_when_peer_is_silent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut channel = TcpChannel::connect(addr, short_timeouts()).unwrap();
        let _peer = listener.accept().unwrap();

        let mut buf = [0u8; 8];
        let err = channel.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
        assert!(channel.is_connected());
    }

    #[test]
    fn peer_close_disconnects_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut channel = TcpChannel::connect(addr, short_timeouts()).unwrap();
        let (peer, _) = listener.accept().unwrap();
        drop(peer);

        let mut buf = [0u8; 8];
        assert_eq!(channel.read(&mut buf).unwrap(), 0);
        assert!(!channel.is_connected());

        let err = channel.write(b"isBusy;\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}

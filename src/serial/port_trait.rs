//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Trait for serial port I/O operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Read whatever bytes are available, waiting for at least one
    ///
    /// Returns 0 once the port is closed.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Adapter implementing `SerialPortIO` for any async byte stream
///
/// Wraps a `tokio_serial::SerialStream` in production; tests use in-memory
/// streams such as `tokio::io::duplex`.
pub struct TokioSerialPort<S = tokio_serial::SerialStream> {
    port: S,
}

impl<S> TokioSerialPort<S> {
    pub fn new(port: S) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> S {
        self.port
    }
}

#[async_trait]
impl<S> SerialPortIO for TokioSerialPort<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf).await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

    /// Mock serial port for testing
    ///
    /// Reads are served from a queue of chunks. A responder closure may
    /// enqueue replies for every frame written. With nothing queued, `read`
    /// never completes, like an idle serial line.
    #[derive(Clone)]
    pub struct MockSerialPort {
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub read_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        responder: Arc<Mutex<Option<Responder>>>,
    }

    impl MockSerialPort {
        pub fn new() -> Self {
            Self {
                written_data: Arc::new(Mutex::new(Vec::new())),
                read_queue: Arc::new(Mutex::new(VecDeque::new())),
                write_error: Arc::new(Mutex::new(None)),
                responder: Arc::new(Mutex::new(None)),
            }
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        /// Queue bytes to be returned by a later `read`
        pub fn push_read(&self, chunk: &[u8]) {
            self.read_queue.lock().unwrap().push_back(chunk.to_vec());
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }

        /// Answer every written frame with the chunks returned by `responder`
        pub fn set_responder<F>(&self, responder: F)
        where
            F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
        {
            *self.responder.lock().unwrap() = Some(Box::new(responder));
        }
    }

    #[async_trait]
    impl SerialPortIO for MockSerialPort {
        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written_data.lock().unwrap().push(data.to_vec());

            if let Some(responder) = self.responder.lock().unwrap().as_mut() {
                let replies = responder(data);
                self.read_queue.lock().unwrap().extend(replies);
            }
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let next = self.read_queue.lock().unwrap().pop_front();
            let Some(mut chunk) = next else {
                return std::future::pending().await;
            };

            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                chunk.drain(..n);
                self.read_queue.lock().unwrap().push_front(chunk);
            }
            Ok(n)
        }
    }

    #[tokio::test]
    async fn test_mock_read_splits_large_chunk() {
        let mut port = MockSerialPort::new();
        port.push_read(&[1, 2, 3, 4, 5]);

        let mut buf = [0u8; 3];
        assert_eq!(port.read(&mut buf).await.unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(port.read(&mut buf).await.unwrap(), 2);
        assert_eq!(buf[..2], [4, 5]);
    }

    #[tokio::test]
    async fn test_mock_responder() {
        let mut port = MockSerialPort::new();
        port.set_responder(|written| vec![written.iter().rev().copied().collect()]);

        port.write_all(&[1, 2]).await.unwrap();
        let mut buf = [0u8; 8];
        let n = port.read(&mut buf).await.unwrap();
        assert_eq!(buf[..n], [2, 1]);
        assert_eq!(port.get_written_data(), vec![vec![1, 2]]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_port_over_mock_stream() {
        let stream = tokio_test::io::Builder::new()
            .write(&[0x06, 0x02])
            .read(&[0xAA, 0xBB])
            .build();
        let mut port = TokioSerialPort::new(stream);

        port.write_all(&[0x06, 0x02]).await.unwrap();
        port.flush().await.unwrap();

        let mut buf = [0u8; 4];
        let n = port.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0xAA, 0xBB]);
    }

    #[tokio::test]
    async fn test_tokio_port_over_duplex() {
        let (host, mut device) = tokio::io::duplex(64);
        let mut port = TokioSerialPort::new(host);

        port.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        drop(device);
        assert_eq!(port.read(&mut buf).await.unwrap(), 0);
    }
}

//! Console publisher, used for dry runs

use crate::error::{Error, Result};
use crate::publisher::Publisher;
use crate::wire;
use async_trait::async_trait;
use std::io::{self, Stdout, Write};
use tracing::debug;

/// Writes each message as a `key,payload` line
pub struct ConsolePublisher<W = Stdout> {
    out: W,
}

impl ConsolePublisher<Stdout> {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for ConsolePublisher<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsolePublisher<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> Publisher for ConsolePublisher<W> {
    fn name(&self) -> &'static str {
        "console-publisher"
    }

    async fn initialise(&mut self) -> Result<()> {
        debug!("Console publisher ready");
        Ok(())
    }

    async fn publish(&mut self, key: &str, payload: &str) -> Result<()> {
        writeln!(self.out, "{}", wire::encode(key, payload))
            .and_then(|_| self.out.flush())
            .map_err(|e| Error::PublishError(format!("console write failed for {key}: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_one_line_per_message() {
        let mut publisher = ConsolePublisher::with_writer(Vec::new());
        tokio_test::block_on(async {
            publisher.initialise().await.unwrap();
            publisher.publish("FR", r#"{"a":1,"b":2}"#).await.unwrap();
            publisher.publish("DE", "{}").await.unwrap();
            publisher.close().await.unwrap();
        });

        let out = String::from_utf8(publisher.into_inner()).unwrap();
        assert_eq!(out, "FR,{\"a\":1,\"b\":2}\nDE,{}\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_recoverable() {
        let mut publisher = ConsolePublisher::with_writer(BrokenPipe);
        let err = tokio_test::block_on(publisher.publish("FR", "{}")).unwrap_err();
        assert!(err.is_recoverable());
    }
}

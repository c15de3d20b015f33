//! Direct port of `sumoclient/outputhandlers.py::STDOUTHandler`, useful for
//! local dry runs and exercised directly by tests.

use async_trait::async_trait;
use tracing::info;

use crate::{Element, Result, SendOptions, Sink};

#[derive(Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        StdoutSink
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn send(&self, payload: &[Element], options: &SendOptions) -> Result<bool> {
        for element in payload {
            println!("{}", element.encode(options.jsondump)?);
        }
        info!(
            count = payload.len(),
            pathname = options.pathname.as_deref().unwrap_or("-"),
            "wrote payload to stdout"
        );
        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_always_succeeds() {
        let sink = StdoutSink::new();
        let payload = vec![Element::Text("hello".to_string())];
        let options = SendOptions::default();
        assert!(sink.send(&payload, &options).await.unwrap());
    }
}

//! Direct port of `sumoclient/outputhandlers.py::HTTPHandler`'s chunking and
//! compression policy onto the shared [`http::Client`].

use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use tracing::{error, info};

use crate::{Element, EndpointKey, Result, SendOptions, Sink};

const SUMO_CLIENT_HEADER: &str = "mongodb-atlas-collector";

pub struct HttpSink {
    client: http::Client,
    endpoints: HashMap<EndpointKey, String>,
    max_payload_bytesize: usize,
    compress: bool,
}

impl HttpSink {
    pub fn new(
        client: http::Client,
        endpoints: HashMap<EndpointKey, String>,
        max_payload_bytesize: usize,
        compress: bool,
    ) -> Self {
        HttpSink {
            client,
            endpoints,
            max_payload_bytesize,
            compress,
        }
    }

    /// Partitions `lines` into newline-joined batches, each serialized form
    /// at most `max_payload_bytesize` bytes. An element that alone exceeds
    /// the limit is still sent, as its own single-item batch.
    fn chunk(&self, lines: &[String]) -> Vec<String> {
        let mut batches = Vec::new();
        let mut current = String::new();

        for line in lines {
            let would_be_len = if current.is_empty() {
                line.len()
            } else {
                current.len() + 1 + line.len()
            };

            if would_be_len > self.max_payload_bytesize && !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }

            if current.is_empty() {
                current.push_str(line);
            } else {
                current.push('\n');
                current.push_str(line);
            }
        }

        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    fn compress_body(&self, body: &str) -> std::io::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body.as_bytes())?;
        encoder.finish()
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, payload: &[Element], options: &SendOptions) -> Result<bool> {
        let lines: Vec<String> = payload
            .iter()
            .map(|e| e.encode(options.jsondump))
            .collect::<Result<_>>()?;

        if lines.is_empty() {
            return Ok(true);
        }

        let url = options
            .endpoint_key
            .and_then(|k| self.endpoints.get(&k))
            .cloned()
            .unwrap_or_default();

        let batches = self.chunk(&lines);
        info!(
            batches = batches.len(),
            pathname = options.pathname.as_deref().unwrap_or("-"),
            "sending payload to sink"
        );

        for batch in batches {
            let mut headers = options.extra_headers.clone();
            headers.insert("X-Sumo-Client".to_string(), SUMO_CLIENT_HEADER.to_string());

            let body = if self.compress {
                headers.insert("Content-Encoding".to_string(), "deflate".to_string());
                self.compress_body(&batch)?
            } else {
                batch.into_bytes()
            };

            if let Err(err) = self.client.post(&url, &headers, body).await {
                error!(error = %err, "sink batch delivery failed");
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_with_limit(limit: usize) -> HttpSink {
        HttpSink::new(
            http::Client::new(http::Auth::None, std::time::Duration::from_secs(1), 0, 0.1),
            HashMap::new(),
            limit,
            false,
        )
    }

    #[test]
    fn chunks_stay_under_the_byte_limit() {
        let sink = sink_with_limit(10);
        let lines: Vec<String> = vec!["aaaa".into(), "bbbb".into(), "cccc".into()];
        let batches = sink.chunk(&lines);
        assert_eq!(batches, vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn oversized_single_element_is_its_own_batch() {
        let sink = sink_with_limit(4);
        let lines = vec!["this-line-is-too-long".to_string()];
        let batches = sink.chunk(&lines);
        assert_eq!(batches, vec!["this-line-is-too-long".to_string()]);
    }
}

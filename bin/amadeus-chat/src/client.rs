//! HTTP side of the terminal client: one POST per turn, SSE frames folded
//! into the [`Transcript`] and echoed to the terminal as they arrive.

use std::io::Write;

use amadeus_agent::{Persona, SseDecoder, SseFrame, StreamEvent, Transcript};
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, warn};

pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(http: reqwest::Client, server: &str, persona: Persona) -> Self {
        Self {
            http,
            endpoint: endpoint_for(server, persona),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one turn. Transport problems are rendered into the transcript
    /// rather than returned; only terminal I/O errors escape.
    pub async fn send<W: Write>(
        &self,
        transcript: &mut Transcript,
        message: &str,
        out: &mut W,
    ) -> std::io::Result<()> {
        transcript.push_user(message);
        let mut printer = TurnPrinter::new(out);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "message": message, "threadId": transcript.thread_id() }))
            .send()
            .await;
        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                warn!(%status, %body, "server rejected the request");
                return printer.transport_failure(transcript);
            }
            Err(e) => {
                warn!(error = %e, "request failed");
                return printer.transport_failure(transcript);
            }
        };

        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(error = %e, "stream interrupted");
                    return printer.transport_failure(transcript);
                }
            };
            if printer.frames(transcript, decoder.feed(&chunk))? {
                return Ok(());
            }
        }
        if printer.frames(transcript, decoder.finish())? {
            return Ok(());
        }

        warn!("stream ended without a terminal event");
        printer.transport_failure(transcript)
    }
}

/// `<server>/api/generate` for Amadeus, `<server>/api/galileo` for Galileo.
pub fn endpoint_for(server: &str, persona: Persona) -> String {
    let path = match persona {
        Persona::Amadeus => "generate",
        Persona::Galileo => "galileo",
    };
    format!("{}/api/{path}", server.trim_end_matches('/'))
}

/// Writes one assistant turn to the terminal while it streams.
pub struct TurnPrinter<'a, W: Write> {
    out: &'a mut W,
    wrote_text: bool,
}

impl<'a, W: Write> TurnPrinter<'a, W> {
    pub fn new(out: &'a mut W) -> Self {
        Self {
            out,
            wrote_text: false,
        }
    }

    /// Apply decoded frames; `true` once the turn is over.
    pub fn frames(
        &mut self,
        transcript: &mut Transcript,
        frames: impl IntoIterator<Item = SseFrame>,
    ) -> std::io::Result<bool> {
        for frame in frames {
            let event: StreamEvent = match serde_json::from_str(&frame.data) {
                Ok(event) => event,
                Err(e) => {
                    debug!(error = %e, data = %frame.data, "skipping undecodable frame");
                    continue;
                }
            };
            let done = transcript.apply(&event);
            self.print(&event)?;
            if done {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn print(&mut self, event: &StreamEvent) -> std::io::Result<()> {
        match event {
            StreamEvent::Token { content } => {
                write!(self.out, "{content}")?;
                self.wrote_text = true;
            }
            StreamEvent::ToolCall { name, args, .. } => {
                let query = args.get("query").and_then(|q| q.as_str()).unwrap_or_default();
                self.line(&format!("[{name}] {query}"))?;
            }
            StreamEvent::ToolResult { name, content } => {
                self.line(&format!("[{name} done]"))?;
                for source in content.lines().filter(|l| l.starts_with("- ")) {
                    writeln!(self.out, "  {source}")?;
                }
            }
            StreamEvent::Complete => writeln!(self.out)?,
            StreamEvent::Error { content } => self.line(&format!("Error: {content}"))?,
        }
        self.out.flush()
    }

    /// Print on a line of its own, even in the middle of streamed text.
    fn line(&mut self, text: &str) -> std::io::Result<()> {
        if self.wrote_text {
            writeln!(self.out)?;
            self.wrote_text = false;
        }
        writeln!(self.out, "{text}")
    }

    fn transport_failure(&mut self, transcript: &mut Transcript) -> std::io::Result<()> {
        transcript.fail_transport();
        let text = transcript
            .messages()
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.line(&text)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod test {
    use amadeus_agent::transcript::TRANSPORT_FAILURE_TEXT;

    use super::*;

    fn data(json: &str) -> SseFrame {
        SseFrame {
            event: None,
            data: json.to_owned(),
        }
    }

    #[test]
    fn persona_selects_route() {
        assert_eq!(
            endpoint_for("http://localhost:3000/", Persona::Amadeus),
            "http://localhost:3000/api/generate"
        );
        assert_eq!(
            endpoint_for("http://localhost:3000", Persona::Galileo),
            "http://localhost:3000/api/galileo"
        );
    }

    #[test]
    fn streams_tokens_and_tool_activity() {
        let mut transcript = Transcript::new();
        transcript.push_user("fare rules?");
        let mut out = Vec::new();
        let mut printer = TurnPrinter::new(&mut out);

        let done = printer
            .frames(
                &mut transcript,
                vec![
                    data(r#"{"type":"token","content":"Let me check. "}"#),
                    data(r#"{"type":"tool_call","id":"srvtoolu_1","name":"web_search","args":{"query":"amadeus FQN"}}"#),
                    data(r#"{"type":"tool_result","name":"web_search","content":"- Fare notes (https://example.com/fqn)"}"#),
                    data(r#"{"type":"token","content":"Use FQN."}"#),
                    data(r#"{"type":"complete"}"#),
                ],
            )
            .unwrap();
        assert!(done);

        let printed = String::from_utf8(out).unwrap();
        assert_eq!(
            printed,
            "Let me check. \n[web_search] amadeus FQN\n[web_search done]\n  - Fare notes (https://example.com/fqn)\nUse FQN.\n"
        );
        let reply = &transcript.messages()[1];
        assert_eq!(reply.content, "Let me check. Use FQN.");
        assert!(!reply.tool_calls.as_ref().unwrap()[0].is_loading);
    }

    #[test]
    fn error_event_ends_the_turn() {
        let mut transcript = Transcript::new();
        transcript.push_user("q");
        let mut out = Vec::new();
        let mut printer = TurnPrinter::new(&mut out);

        let done = printer
            .frames(
                &mut transcript,
                vec![
                    data("not json"),
                    data(r#"{"type":"error","content":"overloaded_error: Overloaded"}"#),
                    data(r#"{"type":"token","content":"late"}"#),
                ],
            )
            .unwrap();
        assert!(done);
        assert_eq!(transcript.messages()[1].content, "Error: overloaded_error: Overloaded");
        assert_eq!(String::from_utf8(out).unwrap(), "Error: overloaded_error: Overloaded\n");
    }

    #[tokio::test]
    async fn unreachable_server_renders_apology() {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        // Port 9 (discard) on localhost is closed on test machines.
        let client = ChatClient::new(http, "http://127.0.0.1:9", Persona::Amadeus);
        let mut transcript = Transcript::new();
        let mut out = Vec::new();

        client.send(&mut transcript, "hello", &mut out).await.unwrap();

        assert_eq!(transcript.messages()[1].content, TRANSPORT_FAILURE_TEXT);
        assert!(String::from_utf8(out).unwrap().contains("Sorry, I encountered an error"));
    }
}

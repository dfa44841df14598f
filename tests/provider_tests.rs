use std::time::Duration;
use futures::StreamExt;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_test::{assert_err, assert_ok};

use tikzsvg::providers::gemini::{
  parse_stream_payload, GeminiGenerateRequest, GeminiGenerateResponse
};
use tikzsvg::providers::sse::SseDecoder;
use tikzsvg::request::{ContentRequest, Part};
use tikzsvg::config::parse_timeout_secs;
use tikzsvg::{
  Conversion, Converter, Error, ErrorKind, GeminiClient, GeminiConfig,
  GenerationRequest, GenerativeModel, ImageData, ModelConfig,
  ReasoningProfile
};

#[test]
fn test_request_body_shape()
{   let request = ContentRequest
    {   model: "gemini-2.5-pro".to_string()
      , system_instruction: "rules".to_string()
      , parts: vec![
          Part::InlineData(ImageData
          {   mime_type: "image/jpeg".to_string()
            , data: "AAAA".to_string()
          })
        , Part::Text("convert".to_string())
        ]
      , temperature: 0.0
      , thinking_budget: Some(16_000)
    };

    let body = serde_json::to_value(GeminiGenerateRequest::from(&request))
      .unwrap();
    assert_eq!(body, json!({
      "systemInstruction": { "parts": [{ "text": "rules" }] },
      "contents": [{
        "role": "user",
        "parts": [
          { "inlineData": { "mimeType": "image/jpeg", "data": "AAAA" } },
          { "text": "convert" }
        ]
      }],
      "generationConfig": {
        "temperature": 0.0,
        "thinkingConfig": { "thinkingBudget": 16000 }
      }
    }));
}

#[test]
fn test_request_body_omits_thinking_config()
{   let request = ContentRequest
    {   model: "gemini-2.5-flash".to_string()
      , system_instruction: "rules".to_string()
      , parts: vec![Part::Text("draw".to_string())]
      , temperature: 0.0
      , thinking_budget: None
    };
    let body = serde_json::to_value(GeminiGenerateRequest::from(&request))
      .unwrap();
    assert!(body["generationConfig"].get("thinkingConfig").is_none());
}

#[test]
fn test_response_text_skips_thoughts()
{   let response: GeminiGenerateResponse = serde_json::from_value(json!({
      "candidates": [{
        "content": {
          "role": "model",
          "parts": [
            { "text": "planning the figure", "thought": true },
            { "text": "<svg>" },
            { "text": "</svg>" }
          ]
        },
        "finishReason": "STOP"
      }]
    })).unwrap();

    assert_eq!(response.text(), Some("<svg></svg>".to_string()));
    assert_eq!(response.block_reason(), None);
}

#[test]
fn test_response_without_candidates_has_no_text()
{   let response: GeminiGenerateResponse = serde_json::from_value(json!({
      "promptFeedback": { "blockReason": "SAFETY" }
    })).unwrap();

    assert_eq!(response.text(), None);
    assert_eq!(response.block_reason(), Some("SAFETY"));
}

#[test]
fn test_stream_payload_parsing()
{   let payload = r#"{"candidates":[{"content":{"parts":[{"text":"<rect/>"}]}}]}"#;
    assert_eq!(parse_stream_payload(payload), Ok(Some("<rect/>".to_string())));

    let usage_only = r#"{"usageMetadata":{"totalTokenCount":12}}"#;
    assert_eq!(parse_stream_payload(usage_only), Ok(None));

    let blocked = r#"{"promptFeedback":{"blockReason":"OTHER"}}"#;
    assert!(matches!(parse_stream_payload(blocked), Err(Error::ApiError(_))));

    assert!(matches!(
      parse_stream_payload("not json"),
      Err(Error::ParseError(_))
    ));
}

#[test]
fn test_sse_decoder_splits_events_across_chunks()
{   let mut decoder = SseDecoder::new();

    assert!(decoder.feed(b"data: {\"a\":").is_empty());
    assert_eq!(decoder.feed(b"1}\r\n\r\ndata: two\n"), vec!["{\"a\":1}"]);
    assert_eq!(decoder.feed(b"\n: keep-alive\n\n"), vec!["two"]);
    assert!(decoder.finish().is_empty());
}

#[test]
fn test_sse_decoder_joins_multiline_data_and_flushes()
{   let mut decoder = SseDecoder::new();

    assert!(decoder.feed(b"event: message\ndata: line one\ndata:line two\n").is_empty());
    assert_eq!(decoder.finish(), vec!["line one\nline two"]);

    let mut decoder = SseDecoder::new();
    assert!(decoder.feed(b"data: unterminated").is_empty());
    assert_eq!(decoder.finish(), vec!["unterminated"]);
}

#[test]
fn test_data_uri_parsing()
{   let image = ImageData::from_data_uri("data:image/webp;base64,UklGRg==")
      .unwrap();
    assert_eq!(image.mime_type, "image/webp");
    assert_eq!(image.data, "UklGRg==");

    for bad in ["", "data:image/png,AAAA", "image/png;base64,AAAA", "data:;base64,"]
    {   assert!(
          matches!(ImageData::from_data_uri(bad), Err(Error::InvalidImage(_))),
          "accepted {:?}", bad
        );
    }
}

#[test]
fn test_settings_per_conversion()
{   let models = ModelConfig::default();
    let image = ImageData
    {   mime_type: "image/png".to_string()
      , data: "AAAA".to_string()
    };

    let fast = GenerationRequest::new(
      Conversion::DescriptionToTikz("x".to_string())
    , ReasoningProfile::Fast
    ).settings(&models);
    assert_eq!(fast.model, "gemini-2.5-pro");
    assert_eq!(fast.temperature, 0.1);
    assert_eq!(fast.thinking_budget, None);

    let svg = GenerationRequest::new(
      Conversion::TikzToSvg("x".to_string())
    , ReasoningProfile::Thorough
    ).settings(&models);
    assert_eq!(svg.model, "gemini-2.5-flash");
    assert_eq!(svg.thinking_budget, Some(15_000));

    let describe = GenerationRequest::new(
      Conversion::ImageToDescription(image.clone())
    , ReasoningProfile::Thorough
    ).settings(&models);
    assert_eq!(describe.thinking_budget, None);

    let hinted = GenerationRequest::new(
      Conversion::ImageToTikz(image)
    , ReasoningProfile::Fast
    ).with_thinking_budget(512).settings(&models);
    assert_eq!(hinted.thinking_budget, Some(512));
}

#[test]
fn test_gemini_endpoint_uses_configured_base()
{   let client = GeminiClient::new(GeminiConfig
    {   api_base: Some("http://localhost:8080/v1beta/".to_string())
      , ..GeminiConfig::with_api_key("test-key")
    }).unwrap();

    assert!(client.has_api_key());
    assert_eq!(
      client.endpoint("gemini-2.5-flash", "streamGenerateContent?alt=sse"),
      "http://localhost:8080/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
    );
}

#[test]
fn test_config_never_serializes_key()
{   let config = GeminiConfig::with_api_key("secret");
    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains("secret"));
}

#[test]
fn test_timeout_parsing()
{   assert_eq!(parse_timeout_secs("30"), Some(30));
    assert_eq!(parse_timeout_secs(" 5 "), Some(5));
    assert_eq!(parse_timeout_secs("3O"), None);
    assert_eq!(parse_timeout_secs("-1"), None);
}

// ===== Local HTTP server =====

/// Read one request: headers plus a `Content-Length` body
async fn read_request(socket: &mut TcpStream) -> String
{   let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop
    {   let n = socket.read(&mut chunk).await.unwrap();
        if n == 0
        {   break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n")
        {   let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let body_len = head
              .lines()
              .find_map(|l| l.strip_prefix("content-length:"))
              .and_then(|v| v.trim().parse::<usize>().ok())
              .unwrap_or(0);
            if buf.len() >= end + 4 + body_len
            {   break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve a single response, writing `body_parts` as separate writes.
/// Returns the API base to configure and the captured request.
async fn serve_once(
  status: &str
, content_type: &str
, body_parts: Vec<String>
) -> (String, oneshot::Receiver<String>)
{   let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (request_tx, request_rx) = oneshot::channel();

    let head = format!(
      "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
      status,
      content_type,
      body_parts.iter().map(|p| p.len()).sum::<usize>()
    );

    tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let request = read_request(&mut socket).await;
      let _ = request_tx.send(request);

      socket.write_all(head.as_bytes()).await.unwrap();
      for part in body_parts
      {   if socket.write_all(part.as_bytes()).await.is_err()
          {   break;
          }
          let _ = socket.flush().await;
          tokio::time::sleep(Duration::from_millis(10)).await;
      }
      let _ = socket.shutdown().await;
    });

    (format!("http://{}/v1beta", addr), request_rx)
}

fn local_client(api_base: String) -> GeminiClient
{   GeminiClient::new(GeminiConfig
    {   api_base: Some(api_base)
      , timeout_secs: Some(5)
      , ..GeminiConfig::with_api_key("test-key")
    }).unwrap()
}

fn svg_request() -> ContentRequest
{   ContentRequest
    {   model: "gemini-2.5-flash".to_string()
      , system_instruction: "rules".to_string()
      , parts: vec![Part::Text("draw".to_string())]
      , temperature: 0.0
      , thinking_budget: None
    }
}

fn sse_event(text: &str) -> String
{   format!(
      "data: {}\r\n\r\n",
      json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    )
}

#[tokio::test]
async fn test_generate_posts_to_model_endpoint()
{   let body = json!({
      "candidates": [{
        "content": { "parts": [{ "text": "<svg></svg>" }] },
        "finishReason": "STOP"
      }]
    }).to_string();
    let (base, request_rx) = serve_once("200 OK", "application/json", vec![body]).await;
    let client = local_client(base);

    let text = client.generate(&svg_request()).await;
    assert_eq!(assert_ok!(text), "<svg></svg>");

    let request = request_rx.await.unwrap();
    assert!(
      request.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent "),
      "request line: {}", request.lines().next().unwrap_or_default()
    );
    assert!(request.to_lowercase().contains("x-goog-api-key: test-key"));
    assert!(request.contains("\"systemInstruction\""));
}

#[tokio::test]
async fn test_generate_non_success_status_is_api_error()
{   let (base, _request_rx) = serve_once(
      "400 Bad Request"
    , "application/json"
    , vec![r#"{"error":"bad"}"#.to_string()]
    ).await;
    let client = local_client(base);

    let err = assert_err!(client.generate(&svg_request()).await);
    match &err
    {   Error::ApiError(msg) => {
          assert!(msg.contains("400"), "message: {}", msg);
          assert!(msg.contains(r#"{"error":"bad"}"#), "message: {}", msg);
        }
      , other => panic!("unexpected error: {:?}", other)
    }
    assert_eq!(err.kind(), ErrorKind::Upstream);
}

#[tokio::test]
async fn test_generate_blocked_prompt_is_api_error()
{   let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } }).to_string();
    let (base, _request_rx) = serve_once("200 OK", "application/json", vec![body]).await;
    let client = local_client(base);

    let err = assert_err!(client.generate(&svg_request()).await);
    assert!(matches!(&err, Error::ApiError(msg) if msg.contains("SAFETY")), "got {:?}", err);
}

#[tokio::test]
async fn test_generate_without_text_is_empty_response()
{   let body = json!({ "candidates": [] }).to_string();
    let (base, _request_rx) = serve_once("200 OK", "application/json", vec![body]).await;
    let client = local_client(base);

    let err = assert_err!(client.generate(&svg_request()).await);
    assert_eq!(err, Error::EmptyResponse);
}

#[tokio::test]
async fn test_generate_stream_decodes_events_in_order()
{   let first = sse_event("<svg>");
    let second = sse_event("</svg>");
    let (head, tail) = second.split_at(10);
    let body_parts = vec![
      first
    , ": keep-alive\r\n\r\n".to_string()
    , head.to_string()
    , tail.to_string()
    , "data: {\"usageMetadata\":{\"totalTokenCount\":3}}\r\n\r\n".to_string()
    ];
    let (base, request_rx) = serve_once("200 OK", "text/event-stream", body_parts).await;
    let client = local_client(base);

    let stream = assert_ok!(client.generate_stream(&svg_request()).await);
    let items: Vec<Result<String, Error>> = stream.collect().await;
    assert_eq!(items, vec![Ok("<svg>".to_string()), Ok("</svg>".to_string())]);

    let request = request_rx.await.unwrap();
    assert!(request.starts_with(
      "POST /v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse "
    ));
}

#[tokio::test]
async fn test_generate_stream_parse_error_ends_stream()
{   let body_parts = vec![
      sse_event("<svg>")
    , "data: not json\r\n\r\n".to_string()
    , sse_event("</svg>")
    ];
    let (base, _request_rx) = serve_once("200 OK", "text/event-stream", body_parts).await;
    let client = local_client(base);

    let stream = assert_ok!(client.generate_stream(&svg_request()).await);
    let items: Vec<Result<String, Error>> = stream.collect().await;

    assert_eq!(items.len(), 2, "items: {:?}", items);
    assert_eq!(items[0], Ok("<svg>".to_string()));
    assert!(matches!(items[1], Err(Error::ParseError(_))), "items: {:?}", items);
}

#[tokio::test]
async fn test_generate_stream_non_success_status_is_api_error()
{   let (base, _request_rx) = serve_once(
      "500 Internal Server Error"
    , "application/json"
    , vec![r#"{"error":"down"}"#.to_string()]
    ).await;
    let client = local_client(base);

    match client.generate_stream(&svg_request()).await
    {   Err(Error::ApiError(msg)) => assert!(msg.contains("500"), "message: {}", msg)
      , Err(other) => panic!("unexpected error: {:?}", other)
      , Ok(_) => panic!("expected an error for status 500")
    }
}

#[tokio::test]
async fn test_converter_streams_svg_over_http()
{   let body_parts = vec![
      sse_event("Sure, here:")
    , sse_event("<svg width='10'>")
    , sse_event("<rect/>")
    , sse_event("</svg> done")
    ];
    let (base, _request_rx) = serve_once("200 OK", "text/event-stream", body_parts).await;
    let converter = Converter::new(local_client(base), ModelConfig::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let svg = converter
      .generate_svg_from_tikz("\\draw (0,0) rectangle (1,1);", ReasoningProfile::Fast, Some(&tx))
      .await;
    assert_eq!(assert_ok!(svg), "<svg width='10'><rect/></svg>");

    drop(tx);
    let mut progress = Vec::new();
    while let Some(item) = rx.recv().await
    {   progress.push(item);
    }
    assert_eq!(progress, vec![
      "<svg width='10'>".to_string()
    , "<svg width='10'><rect/>".to_string()
    , "<svg width='10'><rect/></svg>".to_string()
    ]);
}

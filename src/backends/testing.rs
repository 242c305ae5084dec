//! In-memory backends for tests.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use crate::{
    backends::traits::{ImageBackend, TextBackend},
    error::{Result, ScrollError},
    models::{
        ImageGenerationRequest, ImageGenerationResponse, TextGenerationRequest,
        TextGenerationResponse,
    },
    outpaint::raster,
};

pub const STUB_TILE_COLOR: [u8; 3] = [10, 20, 30];

/// Answers every request with a solid PNG of the requested size, except for
/// models listed as failing.
#[derive(Default)]
pub struct StubImageBackend {
    failing_models: Vec<String>,
    rejects_credentials: bool,
    requests: Mutex<Vec<ImageGenerationRequest>>,
}

impl StubImageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ids` are matched against the last path segment of the backend model name.
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing_models: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Every model rejects the credential.
    pub fn rejecting() -> Self {
        Self {
            rejects_credentials: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ImageGenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBackend for StubImageBackend {
    async fn generate(&self, request: ImageGenerationRequest) -> Result<ImageGenerationResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.rejects_credentials {
            return Err(ScrollError::ConfigError(
                "Replicate rejected the API token (401 Unauthorized)".into(),
            ));
        }

        let id = request.model.rsplit('/').next().unwrap_or_default();
        if self.failing_models.iter().any(|m| m == id) {
            return Err(ScrollError::TransientBackendError(format!("{} is down", id)));
        }

        let tile = RgbImage::from_pixel(request.width, request.height, Rgb(STUB_TILE_COLOR));
        Ok(ImageGenerationResponse {
            images: vec![raster::png_data_url(&DynamicImage::ImageRgb8(tile))?],
            model: request.model,
        })
    }

    fn is_configured(&self) -> bool {
        true
    }
}

pub struct StubTextBackend {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl StubTextBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn timing_out() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextBackend for StubTextBackend {
    async fn generate(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse> {
        self.prompts.lock().unwrap().push(request.prompt);
        match &self.reply {
            Some(text) => Ok(TextGenerationResponse {
                text: text.clone(),
                model: "stub".into(),
                finish_reason: Some("STOP".into()),
            }),
            None => Err(ScrollError::TimeoutError("text generation exceeded 30000ms".into())),
        }
    }

    fn is_configured(&self) -> bool {
        self.reply.is_some()
    }
}

/// Accepts connections and never writes a byte back.
pub async fn silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Answers every request with the same raw HTTP response. The counter tracks
/// how many requests were served.
pub async fn canned_server(
    status: &str,
    headers: &[(&str, String)],
    body: String,
) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let mut response = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
    for (name, value) in headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(&body);
    let response = Arc::new(response.into_bytes());

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_some() {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                }
            });
        }
    });
    (addr, hits)
}

async fn read_request(socket: &mut TcpStream) -> Option<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(())
}

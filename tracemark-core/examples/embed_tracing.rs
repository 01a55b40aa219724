//! Example showing the tracing output of an embed / verify cycle.
//!
//! Run with: cargo run -p tracemark-core --example embed_tracing

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use tokio_util::sync::CancellationToken;
use tracemark_core::{EmbedRequest, EncodedImage, MemoryRegistry, Payload, Verifier, Watermarker};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("tracemark_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Tracemark Tracing Demo ===\n");

    let pixels = RgbaImage::from_fn(256, 256, |x, y| {
        Rgba([60 + (x / 3) as u8, 70 + (y / 3) as u8, 120, 255])
    });
    let source = match EncodedImage::encode_png(&pixels) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to encode source image: {}", e);
            return;
        }
    };

    let payload = match Payload::now("demo@tracemark") {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Invalid payload: {}", e);
            return;
        }
    };
    println!("Payload: {}\n", payload.message());

    let registry = Arc::new(MemoryRegistry::new());
    let cancel = CancellationToken::new();

    let marked = match Watermarker::new(registry.clone())
        .embed(&source, EmbedRequest::new(payload), &cancel)
        .await
    {
        Ok(m) => m,
        Err(e) => {
            println!("\n❌ Embed failed: {}", e);
            return;
        }
    };
    println!("\n✅ Embedded into {} tiles", marked.report.tiles);
    println!("   Hash:   {}", marked.content_hash);
    println!("   Record: {}", marked.ledger_entry.id);

    let verdict = Verifier::new(registry).verify(&marked.image, &cancel).await;
    println!("\nVerdict: {:?} / {:?}", verdict.status, verdict.confidence);
}

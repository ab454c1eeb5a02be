//! Test Prediction Client
//!
//! Sends a base64-encoded image to the gesture pipeline over NATS and prints
//! the reply. Without an image argument it generates a random synthetic PNG.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{Rgb, RgbImage};
use rand::Rng;
use serde::Serialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
struct PredictRequest {
    image: String,
}

/// Generate a random RGB PNG for smoke testing the pipeline without a camera
fn generate_test_image(size: u32) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let img = RgbImage::from_fn(size, size, |_, _| {
        Rgb([rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()])
    });

    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .context("Failed to encode test image")?;
    Ok(bytes)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Prediction Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("gesture.predict");
    let image_path = args.get(3);

    let image_bytes = match image_path {
        Some(path) => {
            info!(path = %path, "Reading image file");
            std::fs::read(path).context(format!("Failed to read image from {path}"))?
        }
        None => {
            info!("No image supplied, generating a random 256x256 test image");
            generate_test_image(256)?
        }
    };

    let request = PredictRequest {
        image: format!("data:image/png;base64,{}", STANDARD.encode(&image_bytes)),
    };
    let payload = serde_json::to_vec(&request)?;

    // Connect to NATS
    let client = async_nats::connect(nats_url).await?;
    info!(nats_url = %nats_url, subject = %subject, "Connected to NATS");

    // Request/reply with a timeout so a missing server fails fast
    let response = tokio::time::timeout(
        Duration::from_secs(10),
        client.request(subject.to_string(), payload.into()),
    )
    .await
    .context("Timed out waiting for a prediction")??;

    let body = String::from_utf8_lossy(&response.payload);
    info!("Response: {}", body);
    println!("{body}");

    Ok(())
}

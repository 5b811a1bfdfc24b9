//! Off-thread image compression: decode, constrain to a bounding box, and
//! re-encode as lossy JPEG.
//!
//! Each call dispatches exactly one isolated blocking task and tears it
//! down after a single request/response exchange; there is no worker pool,
//! so correctness never depends on ordering across concurrent invocations.
//! Failures cross the task boundary as typed values, never as panics, and
//! the whole round trip is bounded by a timeout.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;
use std::time::Duration;
use tokio::task;
use tokio::time::timeout;

use crate::config::CompressionConfig;
use crate::error::CompressError;

pub const DEFAULT_QUALITY: f32 = 0.8;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One compression job. Created per upload, fully consumed by a single
/// [`compress`] call, never persisted.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
  pub image_bytes: Vec<u8>,
  /// Advisory only; the actual format is sniffed from the bytes.
  pub mime_type: Option<String>,
  pub max_width: u32,
  pub max_height: u32,
  /// Lossy quality factor in (0, 1]; defaults to 0.8.
  pub quality: Option<f32>,
}

impl CompressionRequest {
  pub fn new(image_bytes: Vec<u8>, max_width: u32, max_height: u32) -> Self {
    Self {
      image_bytes,
      mime_type: None,
      max_width,
      max_height,
      quality: None,
    }
  }

  pub fn from_config(image_bytes: Vec<u8>, config: &CompressionConfig) -> Self {
    Self {
      image_bytes,
      mime_type: None,
      max_width: config.max_width,
      max_height: config.max_height,
      quality: Some(config.quality),
    }
  }
}

/// Result of a successful job, with both byte sizes so the caller can show
/// the compression ratio.
#[derive(Debug, Clone)]
pub struct CompressionOutput {
  pub compressed_bytes: Vec<u8>,
  pub original_size: usize,
  pub compressed_size: usize,
  pub width: u32,
  pub height: u32,
}

/// Compress with the default timeout.
pub async fn compress(request: CompressionRequest) -> Result<CompressionOutput, CompressError> {
  compress_with_timeout(request, DEFAULT_TIMEOUT).await
}

/// Compress with an explicit bound on the worker round trip. Past the
/// deadline the job is treated as failed and the worker abandoned.
pub async fn compress_with_timeout(
  request: CompressionRequest,
  limit: Duration,
) -> Result<CompressionOutput, CompressError> {
  let worker = task::spawn_blocking(move || run_job(request));

  match timeout(limit, worker).await {
    Ok(Ok(result)) => result,
    Ok(Err(join_error)) => Err(CompressError::WorkerGone(join_error.to_string())),
    Err(_) => Err(CompressError::Timeout(limit)),
  }
}

fn run_job(request: CompressionRequest) -> Result<CompressionOutput, CompressError> {
  if request.image_bytes.is_empty() {
    return Err(CompressError::EmptyInput);
  }
  let original_size = request.image_bytes.len();

  let format = image::guess_format(&request.image_bytes).map_err(|_| {
    CompressError::UnsupportedFormat(
      request
        .mime_type
        .clone()
        .unwrap_or_else(|| "unknown".to_string()),
    )
  })?;

  let decoded = image::load_from_memory_with_format(&request.image_bytes, format)
    .map_err(|e| CompressError::Decode(e.to_string()))?;

  let (width, height) = decoded.dimensions();
  let (target_width, target_height) =
    fit_within(width, height, request.max_width, request.max_height);

  let resized = if (target_width, target_height) == (width, height) {
    decoded
  } else {
    decoded.resize_exact(target_width, target_height, FilterType::Lanczos3)
  };

  // JPEG has no alpha channel
  let rgb = resized.to_rgb8();

  let mut buffer = Vec::new();
  let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality_factor(request.quality));
  encoder
    .encode_image(&rgb)
    .map_err(|e| CompressError::Encode(e.to_string()))?;

  Ok(CompressionOutput {
    original_size,
    compressed_size: buffer.len(),
    compressed_bytes: buffer,
    width: target_width,
    height: target_height,
  })
}

/// Contain-fit: scale both dimensions down by the larger bound-relative
/// factor, preserving aspect ratio exactly; never scale up.
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
  if width <= max_width && height <= max_height {
    return (width, height);
  }

  let scale = f64::max(
    width as f64 / max_width as f64,
    height as f64 / max_height as f64,
  );
  let fitted_width = ((width as f64 / scale).round() as u32).clamp(1, max_width);
  let fitted_height = ((height as f64 / scale).round() as u32).clamp(1, max_height);
  (fitted_width, fitted_height)
}

fn quality_factor(quality: Option<f32>) -> u8 {
  let quality = quality.unwrap_or(DEFAULT_QUALITY).clamp(0.01, 1.0);
  (quality * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
  use super::*;

  fn test_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
      image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
      .write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
      )
      .unwrap();
    bytes
  }

  #[test]
  fn fit_within_preserves_aspect_ratio() {
    let (w, h) = fit_within(1600, 1200, 800, 800);
    assert_eq!((w, h), (800, 600));

    let (w, h) = fit_within(1200, 1600, 800, 800);
    assert_eq!((w, h), (600, 800));
  }

  #[test]
  fn fit_within_never_exceeds_either_bound() {
    // Wider than tall, but the height bound is the tighter one
    let (w, h) = fit_within(1000, 900, 800, 400);
    assert!(w <= 800 && h <= 400);
    let input_ratio = 1000.0 / 900.0;
    let output_ratio = w as f64 / h as f64;
    assert!((input_ratio - output_ratio).abs() < 0.01);
  }

  #[test]
  fn fit_within_never_upscales() {
    assert_eq!(fit_within(400, 300, 800, 800), (400, 300));
  }

  #[tokio::test]
  async fn oversized_image_is_resized_within_bounds() {
    let request = CompressionRequest::new(test_png(1600, 1200), 800, 800);
    let output = compress(request).await.unwrap();

    assert_eq!((output.width, output.height), (800, 600));
    assert!(output.original_size > 0);
    assert_eq!(output.compressed_size, output.compressed_bytes.len());

    // The re-encoded bytes really are a decodable image at the new size
    let decoded = image::load_from_memory(&output.compressed_bytes).unwrap();
    assert_eq!(decoded.dimensions(), (800, 600));
  }

  #[tokio::test]
  async fn image_within_bounds_keeps_its_dimensions() {
    let request = CompressionRequest::new(test_png(320, 240), 800, 800);
    let output = compress(request).await.unwrap();
    assert_eq!((output.width, output.height), (320, 240));
  }

  #[tokio::test]
  async fn empty_input_is_a_typed_failure() {
    let request = CompressionRequest::new(Vec::new(), 800, 800);
    let result = compress(request).await;
    assert!(matches!(result, Err(CompressError::EmptyInput)));
  }

  #[tokio::test]
  async fn garbage_bytes_are_an_unsupported_format() {
    let mut request = CompressionRequest::new(b"definitely not an image".to_vec(), 800, 800);
    request.mime_type = Some("application/octet-stream".to_string());
    let result = compress(request).await;
    assert!(matches!(result, Err(CompressError::UnsupportedFormat(_))));
  }

  #[tokio::test]
  async fn truncated_image_is_a_decode_failure() {
    let mut bytes = test_png(100, 100);
    bytes.truncate(40); // keep the PNG magic, drop the data
    let request = CompressionRequest::new(bytes, 800, 800);
    let result = compress(request).await;
    assert!(matches!(result, Err(CompressError::Decode(_))));
  }

  #[tokio::test]
  async fn expired_deadline_is_a_timeout() {
    let request = CompressionRequest::new(test_png(2000, 2000), 800, 800);
    let result = compress_with_timeout(request, Duration::from_nanos(1)).await;
    assert!(matches!(result, Err(CompressError::Timeout(_))));
  }

  #[test]
  fn quality_defaults_and_clamps() {
    assert_eq!(quality_factor(None), 80);
    assert_eq!(quality_factor(Some(0.6)), 60);
    assert_eq!(quality_factor(Some(5.0)), 100);
  }
}

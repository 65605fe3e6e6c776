use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use thiserror::Error;

/// Quality used for frames sent back to streaming clients, trading
/// fidelity for bandwidth.
pub const STREAM_JPEG_QUALITY: u8 = 50;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),
}

/// Decodes a base64 string into an in-memory image.
pub fn decode_base64_image(input: &str) -> Result<DynamicImage, CodecError> {
    let bytes = BASE64.decode(input.trim().as_bytes())?;
    decode_image(&bytes)
}

/// Decodes raw container bytes (JPEG, PNG, ...) into an in-memory image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(bytes).map_err(CodecError::Decode)
}

/// Serializes an image to JPEG at the given quality and base64-encodes it.
pub fn encode_image_base64(frame: &DynamicImage, quality: u8) -> Result<String, CodecError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    frame
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(CodecError::Encode)?;
    Ok(BASE64.encode(&buffer))
}

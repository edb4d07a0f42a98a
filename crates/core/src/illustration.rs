//! Slide illustrations from an image-generation model.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{CreateImageRequestArgs, Image, ImageModel, ImageResponseFormat, ImageSize},
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::io::Cursor;
use tracing::debug;

use crate::error::{DeckError, Result};
use crate::slide::SlideImage;

/// Produces one illustration for a text prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<SlideImage>;
}

/// Parses a resolution string such as `"256x256"`.
pub fn parse_image_size(size: &str) -> Option<ImageSize> {
    match size {
        "256x256" => Some(ImageSize::S256x256),
        "512x512" => Some(ImageSize::S512x512),
        "1024x1024" => Some(ImageSize::S1024x1024),
        "1792x1024" => Some(ImageSize::S1792x1024),
        "1024x1792" => Some(ImageSize::S1024x1792),
        _ => None,
    }
}

/// Maps a model name to the client's model enum.
pub fn parse_image_model(model: &str) -> ImageModel {
    match model {
        "dall-e-2" => ImageModel::DallE2,
        "dall-e-3" => ImageModel::DallE3,
        other => ImageModel::Other(other.to_string()),
    }
}

/// Decodes raw image bytes and re-encodes them as PNG.
pub fn decode_to_png(bytes: &[u8]) -> Result<SlideImage> {
    let raster = image::load_from_memory(bytes)?;
    let mut png = Vec::new();
    raster.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(SlideImage { png })
}

/// An `ImageService` backed by the OpenAI images endpoint.
///
/// One image per call; the returned URL is downloaded with a plain HTTP GET.
pub struct OpenAIImageService {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    model: ImageModel,
    size: ImageSize,
}

impl OpenAIImageService {
    pub fn new(config: OpenAIConfig, model: ImageModel, size: ImageSize) -> Self {
        Self {
            client: Client::with_config(config),
            http: reqwest::Client::new(),
            model,
            size,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ImageService for OpenAIImageService {
    async fn generate_image(&self, prompt: &str) -> Result<SlideImage> {
        let request = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(self.model.clone())
            .n(1)
            .size(self.size.clone())
            .response_format(ImageResponseFormat::Url)
            .build()?;

        let response = self.client.images().create(request).await?;
        let image = response
            .data
            .first()
            .ok_or_else(|| DeckError::RemoteService("image response contained no data".into()))?;

        let bytes = match image.as_ref() {
            Image::Url { url, .. } => {
                debug!(%url, "Fetching generated image");
                self.fetch(url).await?
            }
            Image::B64Json { b64_json, .. } => STANDARD
                .decode(b64_json.as_bytes())
                .map_err(|e| DeckError::Fetch(format!("invalid base64 image payload: {}", e)))?,
        };

        decode_to_png(&bytes)
    }
}

/// An `ImageService` that always fails, so every slide renders without a
/// picture.
pub struct DisabledImageService;

#[async_trait]
impl ImageService for DisabledImageService {
    async fn generate_image(&self, _prompt: &str) -> Result<SlideImage> {
        Err(DeckError::Fetch("image generation disabled".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let raster = RgbaImage::from_pixel(4, 3, Rgba([149, 104, 227, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(raster)
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_to_png_keeps_dimensions() {
        let slide_image = decode_to_png(&encoded(ImageFormat::Png)).unwrap();
        assert!(slide_image.png.starts_with(b"\x89PNG"));
        let raster = image::load_from_memory(&slide_image.png).unwrap();
        assert_eq!((raster.width(), raster.height()), (4, 3));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_to_png(b"<html>not found</html>").unwrap_err();
        assert!(matches!(err, DeckError::Fetch(_)));
    }

    #[test]
    fn test_parse_image_size() {
        assert!(matches!(parse_image_size("256x256"), Some(ImageSize::S256x256)));
        assert!(matches!(
            parse_image_size("1024x1024"),
            Some(ImageSize::S1024x1024)
        ));
        assert!(parse_image_size("300x300").is_none());
    }

    #[test]
    fn test_parse_image_model() {
        assert!(matches!(parse_image_model("dall-e-2"), ImageModel::DallE2));
        match parse_image_model("gpt-image-1") {
            ImageModel::Other(name) => assert_eq!(name, "gpt-image-1"),
            other => panic!("unexpected model {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disabled_service_fails_with_fetch_error() {
        let err = DisabledImageService.generate_image("anything").await.unwrap_err();
        assert!(matches!(err, DeckError::Fetch(_)));
    }
}

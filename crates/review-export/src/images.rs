//! Images embedded in edited content
//!
//! Every `<img>` in an edited document must finish loading (or fail) before
//! the page is captured. Resolution goes through `ImageResolver`; a failure
//! never aborts a render, the image is simply left out.

use crate::error::ExportError;
use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
}

impl ColorSpace {
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    /// JPEG bytes passed through unchanged
    DCTDecode,
    FlateDecode,
}

impl ImageFilter {
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ImageFilter::DCTDecode => "DCTDecode",
            ImageFilter::FlateDecode => "FlateDecode",
        }
    }
}

/// A decoded image ready to become a PDF image XObject.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub filter: ImageFilter,
    pub data: Vec<u8>,
    /// Flate-compressed 8-bit alpha channel
    pub alpha: Option<Vec<u8>>,
}

impl RasterImage {
    /// Decode PNG or JPEG bytes, picking the format from the file signature.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ExportError> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Self::from_png(&bytes)
        } else if bytes.starts_with(&[0xFF, 0xD8]) {
            Self::from_jpeg(bytes)
        } else {
            Err(ExportError::Image("unrecognised image format".into()))
        }
    }

    /// Wrap JPEG bytes, reading dimensions and components from the SOF header.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self, ExportError> {
        let (width, height, components) = parse_jpeg_header(&data)?;
        let color_space = match components {
            1 => ColorSpace::DeviceGray,
            4 => ColorSpace::DeviceCMYK,
            _ => ColorSpace::DeviceRGB,
        };
        Ok(Self {
            width,
            height,
            color_space,
            filter: ImageFilter::DCTDecode,
            data,
            alpha: None,
        })
    }

    /// Decode a PNG and re-encode its samples with Flate, splitting out alpha.
    pub fn from_png(data: &[u8]) -> Result<Self, ExportError> {
        let mut decoder = png::Decoder::new(Cursor::new(data));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| ExportError::Image(format!("PNG header: {}", e)))?;
        let mut buffer = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buffer)
            .map_err(|e| ExportError::Image(format!("PNG data: {}", e)))?;
        let samples = &buffer[..info.buffer_size()];

        let (color_space, channels, has_alpha) = match info.color_type {
            png::ColorType::Grayscale => (ColorSpace::DeviceGray, 1, false),
            png::ColorType::GrayscaleAlpha => (ColorSpace::DeviceGray, 2, true),
            png::ColorType::Rgb => (ColorSpace::DeviceRGB, 3, false),
            png::ColorType::Rgba => (ColorSpace::DeviceRGB, 4, true),
            png::ColorType::Indexed => {
                return Err(ExportError::Image("unexpanded indexed PNG".into()))
            }
        };

        let (color, alpha) = if has_alpha {
            let color_channels = channels - 1;
            let mut color = Vec::with_capacity(samples.len() / channels * color_channels);
            let mut alpha = Vec::with_capacity(samples.len() / channels);
            for pixel in samples.chunks_exact(channels) {
                color.extend_from_slice(&pixel[..color_channels]);
                alpha.push(pixel[color_channels]);
            }
            (color, Some(alpha))
        } else {
            (samples.to_vec(), None)
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            color_space,
            filter: ImageFilter::FlateDecode,
            data: deflate(&color)?,
            alpha: alpha.map(|a| deflate(&a)).transpose()?,
        })
    }

    /// Add the image (and its soft mask, if any) to `doc`.
    pub fn add_to(&self, doc: &mut Document) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "BitsPerComponent" => 8,
            "ColorSpace" => Object::Name(self.color_space.pdf_name().as_bytes().to_vec()),
            "Filter" => Object::Name(self.filter.pdf_name().as_bytes().to_vec()),
        };

        if let Some(alpha) = &self.alpha {
            let mask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => self.width as i64,
                    "Height" => self.height as i64,
                    "BitsPerComponent" => 8,
                    "ColorSpace" => "DeviceGray",
                    "Filter" => "FlateDecode",
                },
                alpha.clone(),
            );
            let mask_id = doc.add_object(mask);
            dict.set("SMask", Object::Reference(mask_id));
        }

        doc.add_object(Stream::new(dict, self.data.clone()))
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| ExportError::Image(e.to_string()))
}

/// Width, height and component count from the first SOF marker.
fn parse_jpeg_header(data: &[u8]) -> Result<(u32, u32, u8), ExportError> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(ExportError::Image("not a JPEG".into()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return Err(ExportError::Image("invalid JPEG marker".into()));
        }
        let marker = data[pos + 1];
        pos += 2;

        if marker == 0xFF {
            // Fill byte, the real marker follows
            pos -= 1;
            continue;
        }
        if marker == 0xD8 || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if marker == 0xD9 || pos + 2 > data.len() {
            break;
        }

        let length = ((data[pos] as usize) << 8) | data[pos + 1] as usize;
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof {
            if pos + 8 > data.len() {
                break;
            }
            let height = ((data[pos + 3] as u32) << 8) | data[pos + 4] as u32;
            let width = ((data[pos + 5] as u32) << 8) | data[pos + 6] as u32;
            let components = data[pos + 7];
            return Ok((width, height, components));
        }
        pos += length;
    }

    Err(ExportError::Image("JPEG dimensions not found".into()))
}

/// Loads the image behind an `<img src>`.
pub trait ImageResolver {
    fn resolve(&self, src: &str) -> Result<RasterImage, ExportError>;
}

/// Resolves inline `data:image/png|jpeg;base64,...` sources.
///
/// Remote URLs are not fetched; they fail and are omitted from the render.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriResolver;

impl ImageResolver for DataUriResolver {
    fn resolve(&self, src: &str) -> Result<RasterImage, ExportError> {
        let rest = src
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ExportError::Image(format!("unsupported source: {}", truncate(src))))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| ExportError::Image("malformed data URI".into()))?;
        let Some(media_type) = meta.strip_suffix(";base64") else {
            return Err(ExportError::Image("data URI is not base64".into()));
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ExportError::Image(e.to_string()))?;

        match media_type.to_ascii_lowercase().as_str() {
            "image/png" => RasterImage::from_png(&bytes),
            "image/jpeg" | "image/jpg" => RasterImage::from_jpeg(bytes),
            other => Err(ExportError::Image(format!("unsupported image type: {}", other))),
        }
    }
}

impl<T: ImageResolver + ?Sized> ImageResolver for &T {
    fn resolve(&self, src: &str) -> Result<RasterImage, ExportError> {
        (**self).resolve(src)
    }
}

impl<T: ImageResolver + ?Sized> ImageResolver for Arc<T> {
    fn resolve(&self, src: &str) -> Result<RasterImage, ExportError> {
        (**self).resolve(src)
    }
}

/// Images loaded ahead of a render, keyed by their `src`.
///
/// Hosts that can only load remote images asynchronously fill the cache
/// first; inline `data:` sources are still decoded on demand.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: Mutex<HashMap<String, RasterImage>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, src: &str, image: RasterImage) {
        if let Ok(mut images) = self.images.lock() {
            images.insert(src.to_string(), image);
        }
    }

    pub fn contains(&self, src: &str) -> bool {
        self.images
            .lock()
            .map(|images| images.contains_key(src))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.images.lock().map(|images| images.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut images) = self.images.lock() {
            images.clear();
        }
    }
}

impl ImageResolver for ImageCache {
    fn resolve(&self, src: &str) -> Result<RasterImage, ExportError> {
        if src.trim_start().starts_with("data:") {
            return DataUriResolver.resolve(src);
        }
        self.images
            .lock()
            .map_err(|e| ExportError::Image(e.to_string()))?
            .get(src)
            .cloned()
            .ok_or_else(|| ExportError::Image(format!("{} was not loaded", truncate(src))))
    }
}

/// True for sources a host has to fetch before rendering.
pub fn is_remote_source(src: &str) -> bool {
    !src.trim_start().starts_with("data:") && !src.trim().is_empty()
}

fn truncate(src: &str) -> String {
    src.chars().take(64).collect()
}

/// Outcome of waiting for one image.
#[derive(Debug)]
pub struct LoadedImage {
    pub src: String,
    pub image: Option<RasterImage>,
}

/// Resolve every source. Each one settles as loaded or failed; failures are
/// logged and never propagate.
pub fn load_all<R: ImageResolver + ?Sized>(resolver: &R, sources: &[&str]) -> Vec<LoadedImage> {
    sources
        .iter()
        .map(|src| {
            let image = match resolver.resolve(src) {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!(src = %truncate(src), error = %e, "image failed to load, skipping");
                    None
                }
            };
            LoadedImage {
                src: src.to_string(),
                image,
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a tiny RGBA PNG.
    pub(crate) fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            let pixels = vec![200u8; (width * height * 4) as usize];
            writer.write_image_data(&pixels).unwrap();
        }
        out
    }

    pub(crate) fn png_data_uri(width: u32, height: u32) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(tiny_png(width, height))
        )
    }

    fn tiny_jpeg_header() -> Vec<u8> {
        // SOI, APP0 (length 16), SOF0 with 40x30, 3 components, EOI
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        data.extend_from_slice(&[0u8; 14]);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x1E, 0x00, 0x28, 0x03]);
        data.extend_from_slice(&[0u8; 9]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn test_png_with_alpha_gets_soft_mask() {
        let image = RasterImage::from_png(&tiny_png(3, 2)).unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.color_space, ColorSpace::DeviceRGB);
        assert!(image.alpha.is_some());

        let mut doc = Document::with_version("1.7");
        let id = image.add_to(&mut doc);
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert!(stream.dict.has(b"SMask"));
    }

    #[test]
    fn test_jpeg_header_parsing() {
        let image = RasterImage::from_jpeg(tiny_jpeg_header()).unwrap();
        assert_eq!((image.width, image.height), (40, 30));
        assert_eq!(image.color_space, ColorSpace::DeviceRGB);
        assert_eq!(image.filter, ImageFilter::DCTDecode);
    }

    #[test]
    fn test_data_uri_resolver() {
        let image = DataUriResolver.resolve(&png_data_uri(4, 4)).unwrap();
        assert_eq!(image.width, 4);

        assert!(DataUriResolver.resolve("https://example.com/a.png").is_err());
        assert!(DataUriResolver.resolve("data:image/gif;base64,R0lG").is_err());
        assert!(DataUriResolver.resolve("data:image/png,raw").is_err());
    }

    #[test]
    fn test_from_bytes_sniffs_format() {
        let png = RasterImage::from_bytes(tiny_png(2, 5)).unwrap();
        assert_eq!((png.width, png.height), (2, 5));
        let jpeg = RasterImage::from_bytes(tiny_jpeg_header()).unwrap();
        assert_eq!(jpeg.filter, ImageFilter::DCTDecode);
        assert!(RasterImage::from_bytes(b"GIF89a".to_vec()).is_err());
    }

    #[test]
    fn test_image_cache_serves_prefetched_remote_sources() {
        let cache = ImageCache::new();
        let url = "https://example.com/figure.png";
        assert!(cache.resolve(url).is_err());

        cache.insert(url, RasterImage::from_png(&tiny_png(6, 3)).unwrap());
        assert!(cache.contains(url));
        assert_eq!(cache.resolve(url).unwrap().width, 6);
        assert_eq!(cache.resolve(&png_data_uri(2, 2)).unwrap().width, 2);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.resolve(url).is_err());
    }

    #[test]
    fn test_remote_source_detection() {
        assert!(is_remote_source("https://example.com/a.png"));
        assert!(is_remote_source("/static/a.jpg"));
        assert!(!is_remote_source(" data:image/png;base64,AAAA"));
        assert!(!is_remote_source(""));
    }

    #[test]
    fn test_load_all_swallows_failures() {
        let good = png_data_uri(1, 1);
        let loaded = load_all(&DataUriResolver, &[good.as_str(), "broken.png"]);
        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].image.is_some());
        assert!(loaded[1].image.is_none());
    }
}

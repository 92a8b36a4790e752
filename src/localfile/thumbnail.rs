use super::error::{LocalFileError, Result};
use super::handle::LocalFile;
use super::object_url::ObjectUrlRegistry;
use async_trait::async_trait;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage, RgbaImage};
use resvg::{tiny_skia, usvg};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Length of the longer thumbnail side.
pub const THUMBNAIL_SIZE: u32 = 512;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;
pub const DEFAULT_VIDEO_SEEK: Duration = Duration::from_secs(1);

/// Extracts a still frame from a video file.
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    async fn first_frame(&self, file: &LocalFile, at: Duration) -> Result<DynamicImage>;
}

/// Decodes frames by piping a single PNG out of the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegFrameDecoder {
    binary: PathBuf,
}

impl FfmpegFrameDecoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    async fn grab(&self, file: &LocalFile, at: Duration) -> Result<Vec<u8>> {
        let output = Command::new(&self.binary)
            .args(["-v", "error", "-ss"])
            .arg(format!("{:.3}", at.as_secs_f64()))
            .arg("-i")
            .arg(&file.path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                LocalFileError::decode(
                    &file.name,
                    format!("failed to run {}: {e}", self.binary.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LocalFileError::decode(&file.name, stderr.trim()));
        }
        Ok(output.stdout)
    }
}

impl Default for FfmpegFrameDecoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl FrameDecoder for FfmpegFrameDecoder {
    async fn first_frame(&self, file: &LocalFile, at: Duration) -> Result<DynamicImage> {
        let mut png = self.grab(file, at).await?;
        // Clips shorter than the seek offset yield nothing; take the first frame instead.
        if png.is_empty() && !at.is_zero() {
            png = self.grab(file, Duration::ZERO).await?;
        }
        if png.is_empty() {
            return Err(LocalFileError::decode(&file.name, "no video frame decoded"));
        }
        image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|e| LocalFileError::decode(&file.name, e))
    }
}

/// Renders image and video files into small JPEG data URLs.
pub struct ThumbnailGenerator {
    size: u32,
    quality: u8,
    video_seek: Duration,
    urls: Arc<ObjectUrlRegistry>,
    frames: Arc<dyn FrameDecoder>,
}

impl ThumbnailGenerator {
    pub fn new(urls: Arc<ObjectUrlRegistry>, frames: Arc<dyn FrameDecoder>) -> Self {
        Self {
            size: THUMBNAIL_SIZE,
            quality: DEFAULT_JPEG_QUALITY,
            video_seek: DEFAULT_VIDEO_SEEK,
            urls,
            frames,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.max(1);
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn with_video_seek(mut self, seek: Duration) -> Self {
        self.video_seek = seek;
        self
    }

    /// Decode `file`, scale its longer side to the thumbnail size and return
    /// the result as a `data:image/jpeg;base64,...` URL.
    ///
    /// The ephemeral URL created for decoding is released on every path.
    pub async fn generate(&self, file: &LocalFile) -> Result<String> {
        let url = self.urls.scoped(file.clone());
        let media = self.decode(url.as_str()).await?;

        let (size, quality) = (self.size, self.quality);
        let name = file.name.clone();
        let jpeg = tokio::task::spawn_blocking(move || render(&media, size, quality))
            .await
            .map_err(|e| LocalFileError::decode(&name, e))?
            .map_err(|e| LocalFileError::decode(&name, e))?;

        drop(url);
        Ok(format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(jpeg)
        ))
    }

    async fn decode(&self, url: &str) -> Result<DynamicImage> {
        let source = self
            .urls
            .resolve(url)
            .ok_or_else(|| LocalFileError::decode(url, "object URL was revoked"))?;

        if source.mime_type.starts_with("video/") {
            self.frames.first_frame(&source, self.video_seek).await
        } else if source.mime_type.starts_with("image/") {
            let bytes = source
                .read()
                .await
                .map_err(|e| LocalFileError::decode(&source.name, e))?;
            let is_svg = source.mime_type == "image/svg+xml";
            let size = self.size;
            tokio::task::spawn_blocking(move || {
                if is_svg {
                    rasterize_svg(&bytes, size)
                } else {
                    image::load_from_memory(&bytes).map_err(|e| e.to_string())
                }
            })
            .await
            .map_err(|e| LocalFileError::decode(&source.name, e))?
            .map_err(|e| LocalFileError::decode(&source.name, e))
        } else {
            Err(LocalFileError::UnsupportedType(source.mime_type))
        }
    }
}

/// Scale `(width, height)` so the longer side equals `size`, keeping the
/// aspect ratio. Neither side drops below one pixel; empty input stays `(0, 0)`.
pub fn target_dimensions(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = |short: u32, long: u32| -> u32 {
        let scaled = (u64::from(short) * u64::from(size) + u64::from(long) / 2) / u64::from(long);
        scaled.max(1) as u32
    };
    if width >= height {
        (size, scale(height, width))
    } else {
        (scale(width, height), size)
    }
}

fn render(media: &DynamicImage, size: u32, quality: u8) -> Result<Vec<u8>, String> {
    let (width, height) = media.dimensions();
    if width == 0 || height == 0 {
        return Err("media has empty dimensions".into());
    }
    let (w, h) = target_dimensions(width, height, size);
    let rgba = if (w, h) == (width, height) {
        media.to_rgba8()
    } else {
        media.resize_exact(w, h, FilterType::Lanczos3).to_rgba8()
    };
    let flat = flatten_onto_white(&rgba);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&flat)
        .map_err(|e| e.to_string())?;
    Ok(jpeg)
}

// JPEG has no alpha channel.
fn flatten_onto_white(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| -> u8 {
            let a = u16::from(a);
            ((u16::from(c) * a + 255 * (255 - a) + 127) / 255) as u8
        };
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

// Vector art is drawn straight at thumbnail size, never at its declared size.
fn rasterize_svg(data: &[u8], size: u32) -> Result<DynamicImage, String> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default()).map_err(|e| e.to_string())?;
    let declared = tree.size();
    let int_size = declared.to_int_size();
    let (width, height) = target_dimensions(int_size.width(), int_size.height(), size);
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| "Failed to allocate SVG pixmap".to_string())?;
    let transform = tiny_skia::Transform::from_scale(
        width as f32 / declared.width(),
        height as f32 / declared.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let pixels: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    RgbaImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| "SVG pixel buffer size mismatch".to_string())
}

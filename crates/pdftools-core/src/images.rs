//! Image conversions: images to PDF pages and PDF pages to JPEG.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ExtendedColorType, ImageFormat, Rgb, RgbImage};
use lopdf::{dictionary, Document, ObjectId, Stream};
use tracing::{debug, warn};

use crate::command::{Artifact, InputDocument, JpgParams, ProcessOutput};
use crate::document::{self, Canvas, MAX_PAGE_DIMENSION};
use crate::error::PdfToolsError;
use crate::layout::{build_document, PageSize, PageSpec};

/// Width of rendered page images in pixels
const RENDER_WIDTH: u32 = 800;

pub const RENDER_NOTICE: &str = "Page rendering is not supported: each JPEG is a blank \
     placeholder sized to its page, not an image of the page content";

fn io_error(e: std::io::Error) -> PdfToolsError {
    PdfToolsError::OperationError(e.to_string())
}

/// Embed one image as an XObject and describe a page that shows it at
/// one point per pixel, scaled down to fit the maximum page size.
fn image_page(doc: &mut Document, input: &InputDocument) -> Result<PageSpec, PdfToolsError> {
    let format = image::guess_format(&input.bytes).ok();
    let img = image::load_from_memory(&input.bytes).map_err(|e| {
        PdfToolsError::UnsupportedFormat(format!("{} is not a supported image: {}", input.name, e))
    })?;
    let (width, height) = (img.width(), img.height());

    let image_id = embed_image(doc, &img, format, &input.bytes)?;

    let scale = (MAX_PAGE_DIMENSION / width.max(height) as f32).min(1.0);
    let size = PageSize::new(width as f32 * scale, height as f32 * scale);
    debug!("Embedding {} as a {}x{} page", input.name, size.width, size.height);

    let mut canvas = Canvas::new();
    canvas.image("Im1", 0.0, 0.0, size.width, size.height);
    Ok(PageSpec {
        size,
        operations: canvas.into_operations(),
        images: vec![("Im1".to_string(), image_id)],
    })
}

fn embed_image(
    doc: &mut Document,
    img: &DynamicImage,
    format: Option<ImageFormat>,
    original: &[u8],
) -> Result<ObjectId, PdfToolsError> {
    let color_space = match img.color() {
        ColorType::L8 => Some("DeviceGray"),
        ColorType::Rgb8 => Some("DeviceRGB"),
        _ => None,
    };

    // Baseline JPEGs go in unchanged
    if let (Some(ImageFormat::Jpeg), Some(color_space)) = (format, color_space) {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => img.width() as i64,
                "Height" => img.height() as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            original.to_vec(),
        )
        .with_compression(false);
        return Ok(doc.add_object(stream));
    }

    let rgb = img.to_rgb8();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw()).map_err(io_error)?;
    let data = encoder.finish().map_err(io_error)?;

    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => rgb.width() as i64,
            "Height" => rgb.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "FlateDecode",
        },
        data,
    )
    .with_compression(false);
    Ok(doc.add_object(stream))
}

/// One page per image, in input order. Any unreadable image fails the job.
pub fn images_to_pdf(inputs: &[InputDocument]) -> Result<ProcessOutput, PdfToolsError> {
    let mut doc = Document::with_version("1.7");
    let pages = inputs
        .iter()
        .map(|input| image_page(&mut doc, input))
        .collect::<Result<Vec<_>, _>>()?;
    let bytes = build_document(doc, pages)?;
    Ok(ProcessOutput::single(Artifact::pdf("images-to-pdf", bytes)))
}

/// Like [`images_to_pdf`], but unreadable images are skipped and reported.
pub fn scan_to_pdf(inputs: &[InputDocument]) -> Result<ProcessOutput, PdfToolsError> {
    let mut doc = Document::with_version("1.7");
    let mut pages = Vec::new();
    let mut notices = Vec::new();

    for input in inputs {
        match image_page(&mut doc, input) {
            Ok(page) => pages.push(page),
            Err(e) => {
                warn!("Skipping {}: {}", input.name, e);
                notices.push(format!("Skipped {}: not a supported image", input.name));
            }
        }
    }
    if pages.is_empty() {
        return Err(PdfToolsError::UnsupportedFormat(
            "No supported images were provided".into(),
        ));
    }

    let bytes = build_document(doc, pages)?;
    Ok(ProcessOutput {
        artifacts: vec![Artifact::pdf("scanned", bytes)],
        notices,
    })
}

fn blank_jpeg(width: u32, height: u32, quality: u8) -> Result<Vec<u8>, PdfToolsError> {
    let canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(canvas.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| PdfToolsError::OperationError(format!("JPEG encoding failed: {}", e)))?;
    Ok(out)
}

/// One JPEG per page, keeping each page's aspect ratio.
pub fn pdf_to_jpg(bytes: &[u8], params: &JpgParams) -> Result<ProcessOutput, PdfToolsError> {
    let doc = document::load(bytes)?;
    let page_ids = document::page_ids(&doc);
    if page_ids.is_empty() {
        return Err(PdfToolsError::OperationError("PDF has no pages".into()));
    }

    let mut artifacts = Vec::with_capacity(page_ids.len());
    for (index, page_id) in page_ids.into_iter().enumerate() {
        let (w, h) = document::page_size(&doc, page_id);
        let height = ((RENDER_WIDTH as f32 * h / w).round() as u32).clamp(1, RENDER_WIDTH * 20);
        let jpeg = blank_jpeg(RENDER_WIDTH, height, params.quality)?;
        artifacts.push(Artifact::new(
            format!("page-{}", index + 1),
            "jpg",
            "image/jpeg",
            jpeg,
        ));
    }

    Ok(ProcessOutput {
        artifacts,
        notices: vec![RENDER_NOTICE.to_string()],
    })
}

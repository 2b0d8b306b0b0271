//! Page renderers.

use std::sync::Arc;

use lopdf::{Document, Object};

use crate::error::RenderFailure;
use crate::export::assembler::OutputBuilder;
use crate::export::copier::PageCopier;
use crate::store::PageRef;

/// US Letter, used when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Options passed to every render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Compress streams of the preview document.
    pub compress: bool,
}

/// The displayable preview of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Page that was rendered.
    pub page_ref: PageRef,
    /// Width in points, after rotation.
    pub width: f32,
    /// Height in points, after rotation.
    pub height: f32,
    /// Page rotation in degrees: 0, 90, 180 or 270.
    pub rotation: u16,
    /// Self-contained single-page PDF.
    pub pdf: Arc<[u8]>,
}

/// Renders one page of a parsed document.
///
/// Implementations run on the blocking thread pool and may take as long as
/// they need.
pub trait PageRenderer: Send + Sync {
    /// Render the page `page_ref` of `document`.
    fn render(
        &self,
        document: &Document,
        page_ref: PageRef,
        options: &RenderOptions,
    ) -> Result<RenderedPage, RenderFailure>;
}

/// Renders a page as a standalone single-page PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageRenderer;

impl PageRenderer for PdfPageRenderer {
    fn render(
        &self,
        document: &Document,
        page_ref: PageRef,
        options: &RenderOptions,
    ) -> Result<RenderedPage, RenderFailure> {
        let fail = |reason: String| {
            RenderFailure::new(page_ref.file_id(), page_ref.page_index(), reason)
        };

        let copied = PageCopier::copy_pages(document, &[page_ref.page_index()], 1)
            .map_err(|e| fail(e.to_string()))?;
        let page_id = copied
            .page_ids
            .first()
            .copied()
            .ok_or_else(|| fail("page was not copied".to_string()))?;

        let (width, height, rotation) = match copied.objects.get(&page_id) {
            Some(Object::Dictionary(page)) => page_geometry(page),
            _ => return Err(fail("copied page is not a dictionary".to_string())),
        };

        let mut builder =
            OutputBuilder::new(&document.version, copied.max_object_number().saturating_add(1));
        builder.absorb(copied);
        builder
            .append_page(page_id)
            .map_err(|e| fail(e.to_string()))?;
        let mut preview = builder.finish().map_err(|e| fail(e.to_string()))?;

        if options.compress {
            preview.compress();
        }

        let mut pdf = Vec::new();
        preview
            .save_to(&mut pdf)
            .map_err(|e| fail(e.to_string()))?;

        Ok(RenderedPage {
            page_ref,
            width,
            height,
            rotation,
            pdf: pdf.into(),
        })
    }
}

/// Displayed width, height and rotation of a page whose inherited
/// attributes are already materialized.
fn page_geometry(page: &lopdf::Dictionary) -> (f32, f32, u16) {
    let media_box = page
        .get(b"MediaBox")
        .ok()
        .and_then(|object| object.as_array().ok())
        .and_then(|values| {
            let numbers: Vec<f32> = values.iter().filter_map(number).collect();
            <[f32; 4]>::try_from(numbers).ok()
        })
        .unwrap_or(DEFAULT_MEDIA_BOX);

    let width = (media_box[2] - media_box[0]).abs();
    let height = (media_box[3] - media_box[1]).abs();

    let rotation = page
        .get(b"Rotate")
        .ok()
        .and_then(|object| object.as_i64().ok())
        .map(|degrees| degrees.rem_euclid(360))
        .filter(|degrees| degrees % 90 == 0)
        .unwrap_or(0) as u16;

    if rotation % 180 == 90 {
        (height, width, rotation)
    } else {
        (width, height, rotation)
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

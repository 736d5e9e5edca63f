//! Visual code generation.
//!
//! What ends up inside the code is a configuration choice: either the full
//! record as text, readable offline by any scanner, or a lookup URL that sends
//! the inspector to the remote sheet.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use qrcode::render::{svg, unicode};
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::Record;

/// Edge length used when the caller does not pick one.
pub const DEFAULT_CODE_SIZE: u32 = 200;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("code could not be generated: {0}")]
    Qr(#[from] qrcode::types::QrError),
}

/// What the scannable code encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CodePayload {
    /// Delimited text dump of all fields.
    Record,
    /// `<base_url>?id=<identifier>`.
    Lookup { base_url: String },
}

impl CodePayload {
    pub fn encode(&self, record: &Record) -> String {
        match self {
            CodePayload::Record => record.summary(),
            CodePayload::Lookup { base_url } => lookup_url(base_url, &record.identifier),
        }
    }
}

/// Appends `id=<identifier>` as a query parameter.
pub fn lookup_url(base_url: &str, identifier: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}id={identifier}")
}

/// A rendered code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeImage {
    /// Payload that was encoded.
    pub payload: String,
    /// Standalone SVG document.
    pub svg: String,
    /// Half-block rendition for terminals.
    pub text: String,
}

impl CodeImage {
    /// `data:` URI carrying the SVG, for form submissions.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:image/svg+xml;base64,{}",
            STANDARD.encode(self.svg.as_bytes())
        )
    }
}

/// External code-image generator.
pub trait CodeRenderer: Send + Sync {
    /// Renders `payload` at roughly `size` x `size` pixels. Completion is
    /// synchronous: an `Ok` image is ready to display or submit.
    fn render(&self, payload: &str, size: u32) -> Result<CodeImage, RenderError>;
}

/// QR renderer: error correction level H, black on white.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrRenderer;

impl CodeRenderer for QrRenderer {
    fn render(&self, payload: &str, size: u32) -> Result<CodeImage, RenderError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)?;

        let svg = code
            .render::<svg::Color>()
            .min_dimensions(size, size)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build();

        let text = code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build();

        Ok(CodeImage {
            payload: payload.to_string(),
            svg,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_url_appends_query() {
        assert_eq!(
            lookup_url("https://sheet.example/lookup", "RC0001"),
            "https://sheet.example/lookup?id=RC0001"
        );
        assert_eq!(
            lookup_url("https://sheet.example/exec?sheet=fittings", "FP0012"),
            "https://sheet.example/exec?sheet=fittings&id=FP0012"
        );
    }

    #[test]
    fn qr_renderer_produces_svg_and_terminal_output() {
        let image = QrRenderer.render("RC0001", DEFAULT_CODE_SIZE).unwrap();

        assert_eq!(image.payload, "RC0001");
        assert!(image.svg.contains("<svg"));
        assert!(image.svg.contains("#000000"));
        assert!(!image.text.is_empty());
        assert!(image
            .to_data_uri()
            .starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn oversized_payload_is_a_render_error() {
        // Level H tops out well below 2 KiB of binary data.
        let payload = "x".repeat(4096);

        assert!(matches!(
            QrRenderer.render(&payload, DEFAULT_CODE_SIZE),
            Err(RenderError::Qr(_))
        ));
    }

    #[test]
    fn payload_modes_deserialize_from_config() {
        let lookup: CodePayload =
            toml::from_str("mode = \"lookup\"\nbase_url = \"https://x\"\n").unwrap();
        assert_eq!(
            lookup,
            CodePayload::Lookup {
                base_url: "https://x".into()
            }
        );
        let record: CodePayload = toml::from_str("mode = \"record\"\n").unwrap();
        assert_eq!(record, CodePayload::Record);
    }
}

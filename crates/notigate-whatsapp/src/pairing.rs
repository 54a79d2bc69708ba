// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR rendering for pairing tokens.
//!
//! The supervisor owns the token; this module only renders it. Rendering is
//! fire-and-forget and never feeds back into session state.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Edge length of rendered PNG codes.
pub const QR_IMAGE_SIZE: u32 = 300;

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("pairing token cannot be encoded as a QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("QR image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Renders the token as half-block characters for a terminal.
pub fn render_terminal(token: &str) -> Result<String, PairingError> {
    let code = QrCode::new(token.as_bytes())?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Renders the token as a PNG at least `size` pixels wide.
pub fn render_png(token: &str, size: u32) -> Result<Vec<u8>, PairingError> {
    let code = QrCode::new(token.as_bytes())?;
    let pixels = code
        .render::<image::Luma<u8>>()
        .min_dimensions(size, size)
        .build();

    let mut png = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(pixels).write_to(&mut png, image::ImageFormat::Png)?;
    Ok(png.into_inner())
}

/// Renders the token as a `data:image/png;base64,...` URL.
pub fn render_data_url(token: &str) -> Result<String, PairingError> {
    let png = render_png(token, QR_IMAGE_SIZE)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Shows new pairing tokens to the operator.
#[derive(Debug, Clone)]
pub struct PairingPresenter {
    print_to_terminal: bool,
}

impl PairingPresenter {
    pub fn new(print_to_terminal: bool) -> Self {
        Self { print_to_terminal }
    }

    /// Logs the token and, if enabled, prints it as a terminal QR code on a
    /// blocking thread.
    pub fn present(&self, token: &str) {
        info!("pairing requested, scan the QR code with WhatsApp > Linked devices");
        if !self.print_to_terminal {
            debug!("terminal QR output disabled");
            return;
        }

        let token = token.to_string();
        drop(tokio::task::spawn_blocking(move || {
            match render_terminal(&token) {
                Ok(qr) => eprintln!("\n{qr}\nScan this QR code with WhatsApp to link this device.\n"),
                Err(e) => warn!(error = %e, "failed to render pairing QR code"),
            }
        }));
    }
}

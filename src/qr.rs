//! Pairing-challenge rendering.
//!
//! Pure boundary from a raw challenge string to a displayable text image.
//! Rendering failure is logged and reported as absence; the challenge stays
//! pending from the network's perspective either way.

use tracing::warn;

/// Render a raw pairing challenge into a scannable text-image QR code.
pub fn render_pairing_qr(raw: &str) -> Option<String> {
    match qr2term::generate_qr_string(raw) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(error = %e, "failed to render pairing QR code");
            None
        }
    }
}

//! Enlarged image view
//!
//! The preview only references one of the session's images. It never
//! touches the run status, and both opening and closing are idempotent.

use tracing::debug;

use super::{PreviewTarget, Session};
use crate::error::SessionError;

impl Session {
    /// Enlarge the uploaded or generated image
    ///
    /// Returns whether the preview changed. Fails if the target image is
    /// not present.
    pub fn open_preview(&self, target: PreviewTarget) -> Result<bool, SessionError> {
        self.update(|state| {
            if state.image_for(target).is_none() {
                return (Err(SessionError::PreviewUnavailable(target.as_str())), false);
            }
            if state.preview == Some(target) {
                return (Ok(false), false);
            }
            debug!("Opening {} preview", target.as_str());
            state.preview = Some(target);
            (Ok(true), true)
        })
    }

    /// Dismiss the preview (close button or background click)
    ///
    /// Returns whether a preview was open.
    pub fn close_preview(&self) -> bool {
        self.update(|state| match state.preview.take() {
            Some(target) => {
                debug!("Closed {} preview", target.as_str());
                (true, true)
            }
            None => (false, false),
        })
    }

    /// Escape key
    pub fn escape(&self) -> bool {
        self.close_preview()
    }
}

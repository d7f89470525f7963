//! Session capture: cookies/localStorage/IndexedDB/screenshot export
//! on a successful attempt. The CDP calls themselves live on
//! `browser::BrowserSession`, which owns the tab; this module is the
//! thin seam `rotation::drive` and the control protocol call through so
//! neither has to know the concrete capture mechanism.

use crate::error::Result;
use crate::model::SessionBlob;
use crate::runner::classifier::ClassifierSignals;
use crate::runner::Session;

pub fn poll_signals(session: &Session, form: &crate::model::FormSelectorBundle) -> ClassifierSignals {
    session.browser.poll_signals(form)
}

pub fn session_blob(session: &Session, credential_id: String) -> Result<SessionBlob> {
    session.browser.capture_session_blob(credential_id)
}

pub fn screenshot(session: &Session) -> Result<Vec<u8>> {
    session.browser.capture_screenshot()
}

#[cfg(test)]
mod tests {
    // Exercised indirectly through `rotation`'s scenario test and
    // `browser`'s own unit tests; a live `Session` needs a real
    // Chromium process, which this core's tests intentionally avoid.
}

//! Form-fill environment owned by a document.

use tracing::{debug, warn};
use vellum_core::{DocumentHandle, FormHandle, Result};
use vellum_engine::entry;
use vellum_engine::status::{FORM_FILL_INFO_SIZE, FORM_FILL_INFO_VERSION};

use crate::library::{EngineAllocation, Runtime};

/// An engine form environment and the info struct it reads.
///
/// The info struct must outlive the environment, so [`close`](Self::close)
/// exits the environment before freeing it.
pub(crate) struct FormEnvironment {
    handle: FormHandle,
    info: EngineAllocation,
}

impl FormEnvironment {
    pub(crate) fn init(rt: &Runtime, document: DocumentHandle) -> Result<Self> {
        let info = rt.arena().alloc(FORM_FILL_INFO_SIZE)?;
        info.fill(0)?;
        info.write_u32(0, FORM_FILL_INFO_VERSION)?;
        let raw = rt.call(|e| e.init_form_fill_environment(document.raw(), info.offset()));
        match FormHandle::from_raw(raw) {
            Some(handle) => {
                debug!(%document, form = %handle, "form environment initialised");
                Ok(Self { handle, info })
            }
            None => {
                let err = rt.failure(entry::INIT_FORM_FILL_ENVIRONMENT);
                info.free();
                warn!(%document, %err, "form environment init failed");
                Err(err)
            }
        }
    }

    pub(crate) fn handle(&self) -> FormHandle {
        self.handle
    }

    pub(crate) fn close(self, rt: &Runtime) {
        let Self { handle, info } = self;
        rt.call(|e| e.exit_form_fill_environment(handle.raw()));
        info.free();
        debug!(form = %handle, "form environment closed");
    }
}

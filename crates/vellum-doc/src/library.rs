//! The engine runtime and its public entry point.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;
use vellum_arena::{Allocation, Arena, ArenaStats};
use vellum_core::{DocumentHandle, EngineErrorCode, Error, Lifecycle, Result};
use vellum_engine::Engine;

use crate::config::LibraryConfig;
use crate::document::{DocCore, Document};
use crate::form::FormEnvironment;
use crate::marshal;

/// The boxed engine as seen through the arena.
pub(crate) type EngineMemory = Box<dyn Engine>;

/// An allocation in engine memory.
pub(crate) type EngineAllocation = Allocation<EngineMemory>;

/// One initialised engine plus its arena.
///
/// Shared by every object created from a [`Library`]; the engine is torn
/// down when the last of them is gone.
pub(crate) struct Runtime {
    arena: Rc<Arena<EngineMemory>>,
    config: LibraryConfig,
}

impl Runtime {
    /// Run `f` with exclusive access to the engine.
    ///
    /// No arena allocation may be made or freed inside `f`.
    pub(crate) fn call<R>(&self, f: impl FnOnce(&mut dyn Engine) -> R) -> R {
        let mut engine = self.arena.memory_mut();
        f(&mut **engine)
    }

    pub(crate) fn arena(&self) -> &Rc<Arena<EngineMemory>> {
        &self.arena
    }

    pub(crate) fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub(crate) fn last_error(&self) -> EngineErrorCode {
        EngineErrorCode::from_raw(self.call(|e| e.get_last_error()))
    }

    /// An [`Error::EngineCall`] for `call`, stamped with the current
    /// last-error code.
    pub(crate) fn failure(&self, call: &'static str) -> Error {
        Error::EngineCall {
            call,
            code: self.last_error(),
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        match self.arena.try_memory_mut() {
            Some(mut engine) => engine.destroy_library(),
            None => tracing::warn!("engine busy at shutdown; destroy_library skipped"),
        }
        debug!(stats = ?self.arena.stats(), "engine destroyed");
    }
}

/// An initialised engine.
///
/// Every [`Document`] opened from a library keeps the engine alive, so the
/// library itself may be dropped first.
pub struct Library {
    rt: Rc<Runtime>,
}

impl Library {
    /// Validate `config`, initialise `engine`, and wrap it.
    pub fn new(engine: impl Engine + 'static, config: LibraryConfig) -> Result<Self> {
        Self::from_boxed(Box::new(engine), config)
    }

    /// [`new`](Self::new) for an engine that is already boxed.
    pub fn from_boxed(engine: Box<dyn Engine>, config: LibraryConfig) -> Result<Self> {
        config.validate()?;
        let arena = Arena::new(engine, config.arena.clone())?;
        arena.memory_mut().init_library();
        debug!(
            capacity = config.arena.capacity_bytes,
            form_fill = config.form_fill,
            "engine initialised"
        );
        Ok(Self {
            rt: Rc::new(Runtime { arena, config }),
        })
    }

    /// Open a document from `bytes`.
    ///
    /// The bytes are copied into an arena allocation that the document owns
    /// for its whole life, since the engine reads the buffer lazily. On any
    /// failure every allocation made so far is freed before returning.
    pub fn open_document(&self, bytes: &[u8], password: Option<&str>) -> Result<Document> {
        let rt = &self.rt;
        if bytes.is_empty() {
            return Err(Error::InvalidArgument {
                reason: "document bytes are empty".into(),
            });
        }
        let size = u32::try_from(bytes.len()).map_err(|_| Error::InvalidArgument {
            reason: format!("document of {} bytes exceeds the engine address space", bytes.len()),
        })?;
        let data = rt.arena().alloc(bytes.len())?;
        data.write(bytes)?;

        let raw = match password {
            Some(password) => {
                let password = rt.arena().scoped_bytes(&marshal::c_string(password)?)?;
                rt.call(|e| e.load_mem_document(data.offset(), size, password.offset()))
            }
            None => rt.call(|e| e.load_mem_document(data.offset(), size, 0)),
        };
        let Some(handle) = DocumentHandle::from_raw(raw) else {
            let code = rt.last_error();
            data.free();
            debug!(%code, "document load failed");
            return Err(Error::DocumentLoadFailed { code });
        };

        let form = if rt.config().form_fill {
            match FormEnvironment::init(rt, handle) {
                Ok(form) => Some(form),
                Err(e) => {
                    rt.call(|engine| engine.close_document(handle.raw()));
                    data.free();
                    return Err(e);
                }
            }
        } else {
            None
        };

        debug!(document = %handle, bytes = bytes.len(), form = form.is_some(), "document opened");
        Ok(Document::from_core(Rc::new(DocCore {
            rt: Rc::clone(rt),
            handle,
            lifecycle: Lifecycle::new("document"),
            pages: RefCell::new(IndexMap::new()),
            next_page_id: Cell::new(0),
            form: RefCell::new(form),
            data: RefCell::new(Some(data)),
        })))
    }

    /// Current arena counters.
    pub fn arena_stats(&self) -> ArenaStats {
        self.rt.arena().stats()
    }

    /// The engine's last-error code.
    pub fn last_error(&self) -> EngineErrorCode {
        self.rt.last_error()
    }

    /// The configuration this library was built with.
    pub fn config(&self) -> &LibraryConfig {
        self.rt.config()
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("stats", &self.rt.arena().stats())
            .finish()
    }
}

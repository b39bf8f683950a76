// common.rs — console printing shared by every module
//
// Messages go to the `log` facade. A thread can redirect its own output into
// a buffer, which is how console commands capture text and how tests observe
// warnings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

// ============================================================
// Redirect buffers for Com_Printf
// ============================================================

static RD_BUFFERS: Mutex<Vec<(ThreadId, String)>> = parking_lot::const_mutex(Vec::new());

/// Mirrors the "developer" cvar.
static DEVELOPER: AtomicBool = AtomicBool::new(false);

/// Begin redirecting this thread's output into a buffer.
pub fn com_begin_redirect() {
    let id = thread::current().id();
    let mut buffers = RD_BUFFERS.lock();
    buffers.retain(|(owner, _)| *owner != id);
    buffers.push((id, String::new()));
}

/// End redirect and return the captured output.
pub fn com_end_redirect() -> Option<String> {
    let id = thread::current().id();
    let mut buffers = RD_BUFFERS.lock();
    let pos = buffers.iter().position(|(owner, _)| *owner == id)?;
    Some(buffers.swap_remove(pos).1)
}

/// Appends to this thread's redirect buffer. Returns false when not redirecting.
fn redirect(msg: &str) -> bool {
    let id = thread::current().id();
    let mut buffers = RD_BUFFERS.lock();
    match buffers.iter_mut().find(|(owner, _)| *owner == id) {
        Some((_, buf)) => {
            buf.push_str(msg);
            if !msg.ends_with('\n') {
                buf.push('\n');
            }
            true
        }
        None => false,
    }
}

// ============================================================
// Com_Printf / Com_DPrintf / Com_Warn
// ============================================================

/// General-purpose print function.
pub fn com_printf(msg: &str) {
    if redirect(msg) {
        return;
    }
    log::info!("{}", msg.trim_end());
}

/// Developer-only print. Controlled by the "developer" cvar.
pub fn com_dprintf(msg: &str) {
    if !developer() {
        return;
    }
    if redirect(msg) {
        return;
    }
    log::debug!("{}", msg.trim_end());
}

/// Recoverable problem: the caller keeps a safe default and carries on.
pub fn com_warn(msg: &str) {
    if redirect(&format!("WARNING: {}", msg)) {
        return;
    }
    log::warn!("{}", msg.trim_end());
}

pub fn set_developer(on: bool) {
    DEVELOPER.store(on, Ordering::Relaxed);
}

pub fn developer() -> bool {
    DEVELOPER.load(Ordering::Relaxed)
}

// ============================================================
// Tests
// ============================================================

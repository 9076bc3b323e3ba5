//! SIGWINCH flag, polled once per run-loop tick and turned into a
//! `resize_all()` call with a freshly queried terminal size (§4.7).

#[cfg(unix)]
mod imp {
    use std::sync::atomic::{AtomicBool, Ordering};

    static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

    extern "C" fn handle_sigwinch(_: libc::c_int) {
        SIGWINCH_RECEIVED.store(true, Ordering::SeqCst);
    }

    pub fn install() -> anyhow::Result<()> {
        unsafe {
            // SAFETY: handle_sigwinch only stores to an AtomicBool, no
            // allocation or non-async-signal-safe calls.
            let handler = handle_sigwinch as *const () as libc::sighandler_t;
            if libc::signal(libc::SIGWINCH, handler) == libc::SIG_ERR {
                anyhow::bail!("failed to install SIGWINCH handler");
            }
        }
        Ok(())
    }

    pub fn take() -> bool {
        SIGWINCH_RECEIVED.swap(false, Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(super) fn set_for_test(value: bool) {
        SIGWINCH_RECEIVED.store(value, Ordering::SeqCst);
    }
}

#[cfg(not(unix))]
mod imp {
    pub fn install() -> anyhow::Result<()> {
        Ok(())
    }

    pub fn take() -> bool {
        false
    }
}

pub fn install_sigwinch_handler() -> anyhow::Result<()> {
    imp::install()
}

pub fn take_sigwinch() -> bool {
    imp::take()
}

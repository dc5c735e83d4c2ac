//! Process-wide runtime: one-time start gate and re-entrancy guard
//!
//! The exported entry points are the only code that reaches the static
//! runtime; everything below them receives it by reference.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::{Once, OnceLock};

use timewarp_control::{ControlListener, SpeedSink};
use timewarp_core::{Config, Speed, TimewarpError};

use crate::dispatch::Dispatcher;
use crate::logging;
use crate::real::RealSymbols;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static CONTROL: Once = Once::new();

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as executing timewarp code. Intercepted calls
/// made while it is held (by the lock, the logger, std) bypass scaling.
pub struct HookGuard {
    _not_send: PhantomData<*const ()>,
}

impl HookGuard {
    /// `None` if this thread is already inside timewarp
    pub fn enter() -> Option<HookGuard> {
        IN_HOOK
            .try_with(|flag| {
                if flag.replace(true) {
                    None
                } else {
                    Some(HookGuard {
                        _not_send: PhantomData,
                    })
                }
            })
            .ok()
            .flatten()
    }

    #[cfg(test)]
    fn is_held() -> bool {
        IN_HOOK.try_with(Cell::get).unwrap_or(true)
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let _ = IN_HOOK.try_with(|flag| flag.set(false));
    }
}

/// Everything an intercepted call needs
pub struct Runtime {
    dispatcher: Dispatcher<RealSymbols>,
    config: Config,
}

impl Runtime {
    fn init() -> Self {
        let config = Config::from_env();
        let dispatcher = Dispatcher::new(RealSymbols::resolve(), config.scale_wallclock);
        Runtime { dispatcher, config }
    }

    pub fn dispatcher(&self) -> &Dispatcher<RealSymbols> {
        &self.dispatcher
    }

    pub fn real(&self) -> &RealSymbols {
        self.dispatcher.real()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Install the diagnostic stream and start the listener thread.
    /// Failure only loses runtime control; interception keeps working.
    fn start_control(&'static self) {
        logging::init(&self.config.log_filter);

        for name in self.real().missing() {
            tracing::error!("{}, dispatcher will fail closed", TimewarpError::SymbolNotResolved(name));
        }

        let path = self.config.socket_path();
        let listener = match ControlListener::bind(&path) {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("control channel unavailable: {}", e);
                return;
            }
        };

        match listener.spawn(self) {
            Ok(_) => tracing::info!(
                socket = %path.display(),
                scale_wallclock = self.config.scale_wallclock,
                "timewarp control listening"
            ),
            Err(e) => tracing::error!("failed to start control thread: {}", e),
        }
    }
}

impl SpeedSink for Runtime {
    fn apply_speed(&self, speed: Speed) {
        let _guard = HookGuard::enter();
        self.dispatcher.apply_speed(speed);
    }
}

/// Idempotent start gate, safe under concurrent first use
pub fn ensure_started() -> &'static Runtime {
    let runtime = RUNTIME.get_or_init(Runtime::init);
    CONTROL.call_once(|| runtime.start_control());
    runtime
}

/// How an intercepted call should proceed
pub enum Entry {
    /// Scale through the dispatcher; the guard covers the whole call
    Hooked(&'static Runtime, HookGuard),
    /// Re-entered from inside timewarp: go straight to the real primitive
    Bypass(&'static Runtime),
    /// Re-entered while the runtime itself is being built on this thread
    Unavailable,
}

/// Entry point shared by every exported symbol
pub fn enter() -> Entry {
    match HookGuard::enter() {
        Some(guard) => Entry::Hooked(ensure_started(), guard),
        None => match RUNTIME.get() {
            Some(runtime) => Entry::Bypass(runtime),
            None => Entry::Unavailable,
        },
    }
}

//! Process termination handling.
//!
//! Cleanup hooks are registered explicitly on a [`ShutdownHooks`] list and run
//! when the process receives a termination signal or exits normally. Other
//! listeners for the same signals keep firing. After the hooks run, the
//! signal takes its default action unless the host asked to handle the stop
//! itself with [`AfterSignal::Continue`].

use crate::error::{LockError, Result};
use signal_hook::consts::{SIGABRT, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use signal_hook::low_level::emulate_default_handler;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Signals that trigger the cleanup hooks.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGINT, SIGTERM, SIGQUIT, SIGABRT];

type Hook = Box<dyn Fn() + Send + Sync>;

/// An ordered list of named cleanup hooks.
#[derive(Clone, Default)]
pub struct ShutdownHooks {
    hooks: Arc<Mutex<Vec<(String, Hook)>>>,
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, Hook)>> {
        self.hooks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a hook. Hooks run in registration order and may run more than once.
    pub fn register(&self, name: impl Into<String>, hook: impl Fn() + Send + Sync + 'static) {
        self.lock().push((name.into(), Box::new(hook)));
    }

    /// Run every hook, returning how many ran.
    pub fn run(&self, reason: &str) -> usize {
        let hooks = self.lock();
        for (name, hook) in hooks.iter() {
            debug!(hook = %name, reason, "running shutdown hook");
            hook();
        }
        hooks.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.lock().iter().map(|(name, _)| name.clone()).collect();
        f.debug_struct("ShutdownHooks").field("hooks", &names).finish()
    }
}

/// What happens once the hooks have run for a termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AfterSignal {
    /// Re-deliver the signal's default action (normally terminating the process).
    #[default]
    DefaultAction,
    /// Keep running; a registered hook is expected to stop the host.
    Continue,
}

/// Runs [`ShutdownHooks`] on SIGINT, SIGTERM, SIGQUIT, and SIGABRT.
///
/// Installation adds a listener alongside any existing ones rather than
/// replacing them.
pub struct TerminationHandler {
    hooks: ShutdownHooks,
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl TerminationHandler {
    /// Install with [`AfterSignal::DefaultAction`].
    pub fn install(hooks: ShutdownHooks) -> Result<Self> {
        Self::install_with(hooks, AfterSignal::default())
    }

    pub fn install_with(hooks: ShutdownHooks, after: AfterSignal) -> Result<Self> {
        let mut signals = Signals::new(TERMINATION_SIGNALS)
            .map_err(|e| LockError::Signal(e.to_string()))?;
        let handle = signals.handle();

        let thread_hooks = hooks.clone();
        let thread = thread::Builder::new()
            .name("session-lock-signals".to_string())
            .spawn(move || {
                for sig in signals.forever() {
                    let name = signal_name(sig);
                    info!(signal = name, "received termination signal, releasing session locks");
                    thread_hooks.run(name);

                    if after == AfterSignal::DefaultAction
                        && let Err(e) = emulate_default_handler(sig)
                    {
                        warn!(signal = name, error = %e, "failed to apply default signal action");
                    }
                }
            })
            .map_err(|e| LockError::Signal(format!("failed to spawn signal thread: {}", e)))?;

        Ok(Self {
            hooks,
            handle,
            thread: Some(thread),
        })
    }

    pub fn hooks(&self) -> &ShutdownHooks {
        &self.hooks
    }

    /// Run the hooks for a normal exit and uninstall the listener.
    pub fn on_exit(self) -> usize {
        self.hooks.run("exit")
    }
}

impl Drop for TerminationHandler {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Conventional name for a termination signal number.
pub fn signal_name(sig: i32) -> &'static str {
    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGQUIT => "SIGQUIT",
        SIGABRT => "SIGABRT",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockConfig;
    use crate::locks::{AcquireOptions, LockManager};
    use serial_test::serial;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let hooks = ShutdownHooks::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second"] {
            let order = Arc::clone(&order);
            hooks.register(name, move || order.lock().unwrap().push(name));
        }

        assert_eq!(hooks.run("test"), 2);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(hooks.len(), 2);
    }

    #[test]
    #[serial]
    fn on_exit_runs_hooks_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let hooks = ShutdownHooks::new();
        let counter = Arc::clone(&count);
        hooks.register("count", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let handler = TerminationHandler::install(hooks).unwrap();
        assert_eq!(handler.on_exit(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_action_follows_hooks_unless_continuing() {
        assert_eq!(AfterSignal::default(), AfterSignal::DefaultAction);
    }

    #[test]
    fn signal_names() {
        assert_eq!(signal_name(SIGINT), "SIGINT");
        assert_eq!(signal_name(SIGTERM), "SIGTERM");
        assert_eq!(signal_name(SIGQUIT), "SIGQUIT");
        assert_eq!(signal_name(SIGABRT), "SIGABRT");
        assert_eq!(signal_name(0), "unknown");
    }

    #[test]
    #[serial]
    fn termination_signals_release_locks_and_keep_other_listeners() {
        for sig in TERMINATION_SIGNALS {
            let dir = TempDir::new().unwrap();
            let manager = LockManager::new(LockConfig::default());
            let hooks = ShutdownHooks::new();
            hooks.register("session-locks", manager.shutdown_hook());

            let other_listener = Arc::new(AtomicBool::new(false));
            let other_id =
                signal_hook::flag::register(sig, Arc::clone(&other_listener)).unwrap();
            let handler = TerminationHandler::install_with(hooks, AfterSignal::Continue).unwrap();

            let handle = manager
                .acquire(&dir.path().join("s.jsonl"), AcquireOptions::default())
                .unwrap();
            let lock_path = handle.lock_path().to_path_buf();
            assert!(lock_path.exists());

            signal_hook::low_level::raise(sig).unwrap();

            assert!(
                wait_until(|| !lock_path.exists()),
                "{} did not release the lock",
                signal_name(sig)
            );
            assert!(wait_until(|| other_listener.load(Ordering::SeqCst)));
            assert_eq!(manager.held_count(), 0);

            drop(handle);
            drop(handler);
            signal_hook::low_level::unregister(other_id);
        }
    }
}

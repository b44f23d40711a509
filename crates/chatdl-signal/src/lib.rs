//! Maps OS signals onto `enable`/`disable`/`default` policies and
//! routes them to an idempotent shutdown controller (spec.md §4.5).
//!
//! Re-architected per Design Notes §9's "cyclic handler references"
//! note: the controller owns a `Notify` plus an idempotence guard
//! rather than closures capturing the sink and engine state directly.

use chatdl_abort::SignalPolicy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[cfg(unix)]
use tokio::signal::unix::SignalKind;

/// Idempotent, re-entrant-safe graceful-shutdown notifier (§5
/// "Cancellation").
#[derive(Default)]
pub struct ShutdownController {
    notify: Notify,
    fired: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Triggers shutdown. A second call is a no-op.
    pub fn finalize(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested; resolves
    /// immediately if it already had been.
    pub async fn finalized(&self) {
        let notified = self.notify.notified();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}

/// Names of the signals this host exposes through `tokio::signal`.
/// `SIGBREAK`/`SIGABRT` have no portable `tokio::signal` equivalent
/// and are never installed (§4.5).
fn portable_signal_names() -> &'static [&'static str] {
    #[cfg(unix)]
    {
        &["SIGINT", "SIGQUIT", "SIGTERM", "SIGHUP"]
    }
    #[cfg(not(unix))]
    {
        &["SIGINT"]
    }
}

fn resolve_policies(overrides: &[(String, SignalPolicy)]) -> Vec<(&'static str, SignalPolicy)> {
    let mut table: Vec<(&'static str, SignalPolicy)> = portable_signal_names()
        .iter()
        .map(|name| (*name, SignalPolicy::Default))
        .collect();
    for (name, policy) in overrides {
        match table.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = *policy,
            None => {
                tracing::warn!(
                    signal = %name,
                    "abort-condition names a signal this host does not expose; ignoring override"
                );
            }
        }
    }
    table
}

fn handle_signal(name: &str, policy: SignalPolicy, controller: &ShutdownController) {
    match policy {
        SignalPolicy::Disable => {
            tracing::info!("Signal Received: {name} Ignored");
        }
        SignalPolicy::Enable | SignalPolicy::Default => {
            tracing::info!("Signal Received: {name}, shutting down");
            controller.finalize();
        }
    }
}

#[cfg(unix)]
fn unix_signal_kind(name: &str) -> Option<SignalKind> {
    match name {
        "SIGQUIT" => Some(SignalKind::quit()),
        "SIGTERM" => Some(SignalKind::terminate()),
        "SIGHUP" => Some(SignalKind::hangup()),
        _ => None,
    }
}

fn spawn_signal_task(name: &'static str, policy: SignalPolicy, controller: Arc<ShutdownController>) {
    if name == "SIGINT" {
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                handle_signal("SIGINT", policy, &controller);
            }
        });
        return;
    }

    #[cfg(unix)]
    if let Some(kind) = unix_signal_kind(name) {
        tokio::spawn(async move {
            let mut stream = match tokio::signal::unix::signal(kind) {
                Ok(stream) => stream,
                Err(error) => {
                    tracing::warn!(signal = name, %error, "failed to install signal handler");
                    return;
                }
            };
            loop {
                if stream.recv().await.is_none() {
                    return;
                }
                handle_signal(name, policy, &controller);
            }
        });
    }
}

/// Installs a handler task per host-exposed signal, applying the
/// operator's `--abort-condition` signal directives as overrides on
/// top of the `default` policy table.
pub struct SignalRouter {
    controller: Arc<ShutdownController>,
}

impl SignalRouter {
    pub fn new(controller: Arc<ShutdownController>) -> Self {
        Self { controller }
    }

    pub fn install(&self, overrides: &[(String, SignalPolicy)]) {
        for (name, policy) in resolve_policies(overrides) {
            spawn_signal_task(name, policy, self.controller.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_is_idempotent() {
        let controller = ShutdownController::new();
        assert!(!controller.is_fired());
        controller.finalize();
        assert!(controller.is_fired());
        controller.finalize();
        assert!(controller.is_fired());
    }

    #[tokio::test]
    async fn finalized_resolves_immediately_if_already_fired() {
        let controller = ShutdownController::new();
        controller.finalize();
        controller.finalized().await;
    }

    #[tokio::test]
    async fn finalized_resolves_after_finalize_from_another_task() {
        let controller = ShutdownController::new();
        let waiter = controller.clone();
        let handle = tokio::spawn(async move {
            waiter.finalized().await;
        });
        tokio::task::yield_now().await;
        controller.finalize();
        handle.await.unwrap();
    }

    #[test]
    fn resolve_policies_applies_known_override() {
        let overrides = vec![("SIGINT".to_string(), SignalPolicy::Disable)];
        let table = resolve_policies(&overrides);
        let sigint = table.iter().find(|(n, _)| *n == "SIGINT").unwrap();
        assert_eq!(sigint.1, SignalPolicy::Disable);
    }

    #[test]
    fn resolve_policies_warns_but_does_not_panic_on_unknown_signal() {
        let overrides = vec![("SIGBREAK".to_string(), SignalPolicy::Enable)];
        let table = resolve_policies(&overrides);
        assert!(table.iter().all(|(n, _)| *n != "SIGBREAK"));
    }
}

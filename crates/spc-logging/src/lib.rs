//! ---
//! spc_section: "03-logging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Structured logging adapters and sinks."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers shared by the controller components.

pub mod macros;

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Controller uuid associated with the log event.
    pub controller: Option<&'a str>,
    /// Live activity uuid associated with the log event.
    pub activity: Option<&'a str>,
    /// Lifecycle operation being carried out.
    pub operation: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a controller uuid.
    pub fn with_controller(mut self, controller: &'a str) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Attach a live activity uuid.
    pub fn with_activity(mut self, activity: &'a str) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Attach an operation name.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl LifecycleOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let ctx = context.copied().unwrap_or_default();
    match outcome {
        LifecycleOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            controller = ctx.controller.unwrap_or(""),
            activity = ctx.activity.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            message = %message
        ),
        LifecycleOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            controller = ctx.controller.unwrap_or(""),
            activity = ctx.activity.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            message = %message
        ),
    }
}

//! ---
//! spc_section: "03-logging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Structured logging adapters and sinks."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---

/// Shared expansion for the level macros below.
#[doc(hidden)]
#[macro_export]
macro_rules! __spc_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            controller = ctx.controller.unwrap_or(""),
            activity = ctx.activity.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with controller context.
#[macro_export]
macro_rules! spc_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__spc_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__spc_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with controller context.
#[macro_export]
macro_rules! spc_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__spc_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__spc_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with controller context.
#[macro_export]
macro_rules! spc_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__spc_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__spc_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with controller context.
#[macro_export]
macro_rules! spc_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__spc_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__spc_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}

//! Global panic handler
//!
//! A panic on the feed's callback thread would otherwise vanish into stderr
//! while the process keeps running without a subscription. The hook logs it
//! through `tracing` with `severity = "fatal"` and exits non-zero.
//!
//! ```no_run
//! ticksink_core::utils::install_panic_handler();
//! ```

use std::any::Any;
use std::panic;
use std::process;
use tracing::error;

/// Log panics through tracing, then exit with status 1
pub fn install_panic_handler() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "<unknown location>".to_string());
        let message = payload_message(panic_info.payload());
        let thread = std::thread::current().name().unwrap_or("<unnamed>").to_string();

        error!(
            severity = "fatal",
            location = %location,
            thread = %thread,
            message = %message,
            "Panic, shutting down"
        );

        // Backup in case tracing is not initialised
        eprintln!("FATAL PANIC in thread '{thread}' at {location}: {message}");

        default_hook(panic_info);

        std::thread::sleep(std::time::Duration::from_millis(100));
        process::exit(1);
    }));

    tracing::info!("Panic handler installed");
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<no message>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(payload_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(payload_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(payload_message(boxed.as_ref()), "<no message>");
    }
}

/// Vulkan debug messenger - forwards validation layer messages to the logging sink
///
/// Only compiled with the `vulkan-validation` feature.

use ash::vk;
use colored::*;
use galaxy_3d_index_buffer::galaxy3d::log::{self, LogSeverity};
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::config::DebugSeverity;

const SOURCE: &str = "galaxy3d::vulkan";

/// Active filter, encoded as u8 (0 = messenger inactive)
static ACTIVE_FILTER: AtomicU8 = AtomicU8::new(0);

static ERRORS: AtomicU32 = AtomicU32::new(0);
static WARNINGS: AtomicU32 = AtomicU32::new(0);
static OTHERS: AtomicU32 = AtomicU32::new(0);

/// Validation message counters since the last messenger was installed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub others: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.others
    }
}

/// Install the filter used by the callback and reset counters
pub(crate) fn init_debug_filter(severity: DebugSeverity) {
    ERRORS.store(0, Ordering::Relaxed);
    WARNINGS.store(0, Ordering::Relaxed);
    OTHERS.store(0, Ordering::Relaxed);
    ACTIVE_FILTER.store(encode(severity), Ordering::Release);
}

/// Stop forwarding messages (called before the messenger is destroyed)
pub(crate) fn cleanup_debug_filter() {
    ACTIVE_FILTER.store(0, Ordering::Release);
}

/// Current validation counters
pub fn validation_stats() -> ValidationStats {
    ValidationStats {
        errors: ERRORS.load(Ordering::Relaxed),
        warnings: WARNINGS.load(Ordering::Relaxed),
        others: OTHERS.load(Ordering::Relaxed),
    }
}

/// Print the validation counters to stderr
pub fn print_validation_stats_report() {
    let stats = validation_stats();

    if stats.total() == 0 {
        eprintln!("{}", "No validation messages".green().bold());
        return;
    }

    eprintln!("{}", "=== Validation Statistics ===".bright_blue().bold());
    if stats.errors > 0 {
        eprintln!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        eprintln!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.others > 0 {
        eprintln!("  {} {}", "Other:".cyan(), stats.others);
    }
    eprintln!("  {} {}", "Total:".white().bold(), stats.total());
}

fn encode(severity: DebugSeverity) -> u8 {
    match severity {
        DebugSeverity::ErrorsOnly => 1,
        DebugSeverity::ErrorsAndWarnings => 2,
        DebugSeverity::All => 3,
    }
}

fn decode(value: u8) -> Option<DebugSeverity> {
    match value {
        1 => Some(DebugSeverity::ErrorsOnly),
        2 => Some(DebugSeverity::ErrorsAndWarnings),
        3 => Some(DebugSeverity::All),
        _ => None,
    }
}

fn log_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Trace
    }
}

/// Vulkan debug messenger callback
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let filter = match decode(ACTIVE_FILTER.load(Ordering::Acquire)) {
        Some(filter) => filter,
        None => return vk::FALSE,
    };
    if !filter.accepts(message_severity) || p_callback_data.is_null() {
        return vk::FALSE;
    }

    // SAFETY: the driver passes valid, NUL-terminated strings for the duration of the call
    let (message_id_name, message) = unsafe {
        let callback_data = *p_callback_data;
        let message_id_name = if callback_data.p_message_id_name.is_null() {
            "Unknown"
        } else {
            CStr::from_ptr(callback_data.p_message_id_name)
                .to_str()
                .unwrap_or("Invalid UTF-8")
        };
        let message = if callback_data.p_message.is_null() {
            "No message"
        } else {
            CStr::from_ptr(callback_data.p_message)
                .to_str()
                .unwrap_or("Invalid UTF-8")
        };
        (message_id_name, message)
    };

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    let severity = log_severity(message_severity);
    match severity {
        LogSeverity::Error => ERRORS.fetch_add(1, Ordering::Relaxed),
        LogSeverity::Warn => WARNINGS.fetch_add(1, Ordering::Relaxed),
        _ => OTHERS.fetch_add(1, Ordering::Relaxed),
    };

    log::log(severity, SOURCE, format!("[{}] {}: {}", type_str, message_id_name, message));

    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;

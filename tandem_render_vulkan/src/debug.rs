/// Validation layer messenger
///
/// Forwards validation messages to the tandem logger, mapped by severity.
/// Errors and warnings are counted for the teardown report; a message id that
/// keeps repeating is logged `REPEAT_LIMIT` times, then only counted.

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tandem_render::tandem::log::{Log, LogSeverity};
use tandem_render::tandem::{Error, Result};
use tandem_render::render_info;

const SOURCE: &str = "tandem::vulkan::validation";

static ERRORS: AtomicU32 = AtomicU32::new(0);
static WARNINGS: AtomicU32 = AtomicU32::new(0);
static REPEATS: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

const REPEAT_LIMIT: u32 = 8;

/// `(errors, warnings)` reported since the last messenger was created
pub(crate) fn validation_counts() -> (u32, u32) {
    (ERRORS.load(Ordering::Relaxed), WARNINGS.load(Ordering::Relaxed))
}

/// Count one more occurrence of `message_id`, returning the new total
pub(crate) fn track_repeat(repeats: &mut FxHashMap<String, u32>, message_id: &str) -> u32 {
    let count = repeats.entry(message_id.to_string()).or_insert(0);
    *count += 1;
    *count
}

fn record_occurrence(message_id: &str) -> u32 {
    let mut guard = match REPEATS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    track_repeat(guard.get_or_insert_with(FxHashMap::default), message_id)
}

/// Print the error/warning totals and the noisiest message ids
pub(crate) fn print_validation_report() {
    let (errors, warnings) = validation_counts();
    if errors == 0 && warnings == 0 {
        eprintln!("{}", "No validation errors or warnings".green());
        return;
    }

    eprintln!("{}", "=== Validation report ===".bright_blue().bold());
    if errors > 0 {
        eprintln!("  {} {}", "Errors:".red().bold(), errors);
    }
    if warnings > 0 {
        eprintln!("  {} {}", "Warnings:".yellow().bold(), warnings);
    }

    let guard = match REPEATS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(repeats) = guard.as_ref() {
        let mut noisy: Vec<_> = repeats.iter().filter(|(_, &count)| count > REPEAT_LIMIT).collect();
        noisy.sort_by(|a, b| b.1.cmp(a.1));
        for (message_id, count) in noisy {
            eprintln!("  {} {} x{}", "Repeated:".cyan(), message_id, count);
        }
    }
}

pub(crate) fn severity_to_log(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
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

pub(crate) fn type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = &*p_callback_data;
    let message_id = if callback_data.p_message_id_name.is_null() {
        "Unknown".into()
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        "No message".into()
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    let severity = severity_to_log(message_severity);
    match severity {
        LogSeverity::Error => ERRORS.fetch_add(1, Ordering::Relaxed),
        LogSeverity::Warn => WARNINGS.fetch_add(1, Ordering::Relaxed),
        _ => 0,
    };

    let occurrences = record_occurrence(&message_id);
    if occurrences <= REPEAT_LIMIT {
        Log::emit(
            severity,
            SOURCE,
            format!("[{}] {}: {}", type_label(message_type), message_id, message),
        );
    }
    if occurrences == REPEAT_LIMIT {
        Log::emit(LogSeverity::Warn, SOURCE, format!("'{}' repeats, muting further reports", message_id));
    }

    // Never abort the call that triggered the message
    vk::FALSE
}

/// Install the messenger on `instance`
pub(crate) fn create_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    ERRORS.store(0, Ordering::Relaxed);
    WARNINGS.store(0, Ordering::Relaxed);
    if let Ok(mut repeats) = REPEATS.lock() {
        *repeats = Some(FxHashMap::default());
    }

    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
    let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&info, None) }
        .map_err(|e| Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e)))?;

    render_info!(SOURCE, "Validation layers enabled");
    Ok((debug_utils, messenger))
}

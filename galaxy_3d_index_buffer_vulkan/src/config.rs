/// Vulkan backend configuration

use ash::vk;

/// Which validation messages are forwarded to the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    #[default]
    ErrorsAndWarnings,
    /// Everything, including info and verbose messages
    All,
}

impl DebugSeverity {
    /// Severity flags requested from the debug messenger
    pub fn message_severity_flags(self) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        match self {
            DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            DebugSeverity::ErrorsAndWarnings => {
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            }
            DebugSeverity::All => {
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            }
        }
    }

    /// Whether a message of the given severity passes this filter
    pub fn accepts(self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
        self.message_severity_flags().intersects(severity)
    }
}

/// Configuration of a [`VulkanBackend`](crate::galaxy3d::VulkanBackend)
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable VK_LAYER_KHRONOS_validation and the debug messenger.
    /// Ignored unless the crate is built with the `vulkan-validation` feature.
    pub enable_validation: bool,
    /// Validation message filter
    pub debug_severity: DebugSeverity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Galaxy3D Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::default(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

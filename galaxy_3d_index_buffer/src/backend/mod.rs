/// Backend module - the capability service consumed by index buffers

// Module declarations
pub mod graphics_backend;
pub mod buffer;
pub mod capabilities;
pub mod software_backend;

// Re-export everything from graphics_backend.rs
pub use graphics_backend::*;

// Re-export from other modules
pub use buffer::*;
pub use capabilities::*;
pub use software_backend::*;

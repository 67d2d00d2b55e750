pub mod file;
pub mod zone;

use lookup_common::registry::Registry;

pub use file::{FileInputHandler, FileOutputHandler};

/// Name under which the file-backed handlers are registered.
pub const FILE_HANDLER: &str = "file";

pub fn register_file_handlers(registry: &mut Registry) {
    registry.register_input_handler(FILE_HANDLER, FileInputHandler::new);
    registry.register_output_handler(FILE_HANDLER, FileOutputHandler::new);
}

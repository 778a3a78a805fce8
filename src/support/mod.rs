//! Reference artifacts bundled with the engine.
//!
//! Both keep their data in memory. They serve as templates for real readers
//! and writers and as fixtures in tests.

mod collecting_writer;
mod list_reader;

pub use collecting_writer::{CollectingItemWriter, ItemSink};
pub use list_reader::ListItemReader;

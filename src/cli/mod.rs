pub mod commands;
pub mod ui;
pub mod util;

pub use util::{CommandContext, load_config, open_database, read_text};

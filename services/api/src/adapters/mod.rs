pub mod db;
pub mod dispatch;
pub mod memory;

pub use db::DbAdapter;
pub use dispatch::{ConsoleDispatcher, ContactRouter, ResendEmailDispatcher, TwilioSmsDispatcher};
pub use memory::MemoryAdapter;

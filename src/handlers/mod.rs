pub mod health;
pub mod diagnostics;
pub mod file_list;

pub use health::*;
pub use diagnostics::*;
pub use file_list::*;

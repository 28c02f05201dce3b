mod balance;
mod expense;
mod integrity;
mod member;
mod money;
mod settlement;
mod split;

pub use balance::*;
pub use expense::*;
pub use integrity::*;
pub use member::*;
pub use money::*;
pub use settlement::*;
pub use split::*;

pub mod market;
pub mod price;
pub mod trading;

pub use market::*;
pub use price::*;
pub use trading::*;

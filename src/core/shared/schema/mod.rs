pub mod social;
pub use self::social::*;

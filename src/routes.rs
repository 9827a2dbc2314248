mod assets;
mod dispatch;
mod error;
mod health_check;

pub use assets::*;
pub use dispatch::*;
pub use error::*;
pub use health_check::*;

//! Request handlers.

pub mod assets;
pub mod health;
pub mod uploads;
pub mod users;
pub mod videos;

pub use assets::*;
pub use health::*;
pub use uploads::*;
pub use users::*;
pub use videos::*;

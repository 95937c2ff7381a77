pub mod division;
pub mod enums;
pub mod event;
pub mod filters;
pub mod forecast;
pub mod imported;
pub mod subject;

pub use division::*;
pub use event::*;
pub use filters::*;
pub use forecast::*;
pub use imported::*;
pub use subject::*;

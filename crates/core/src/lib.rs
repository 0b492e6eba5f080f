pub mod identity;
pub mod pipeline;
pub mod replay;
pub mod session;
pub mod shared;

pub mod projection;
pub mod topics;

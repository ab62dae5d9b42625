pub mod order;
pub mod partner;
pub mod tracking;

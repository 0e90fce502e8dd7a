pub mod meta;
pub mod model;
pub mod wire;


pub use meta::{Condition, ConditionStatus, Meta, condition};
pub use model::*;

pub mod fixed_point;
pub mod position;
pub mod tick_align;
pub mod tick_math;
pub mod units;

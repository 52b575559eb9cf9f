// Per-column processing stages

pub mod encode;
pub mod impute;
pub mod normalize;
pub mod outliers;
pub mod target;

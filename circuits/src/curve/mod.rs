//! BabyJubjub, the twisted Edwards curve `a·x² + y² = 1 + d·x²·y²` embedded
//! in the BN254 scalar field.

mod constants;
mod gadget;
mod point;

pub use constants::*;
pub use gadget::PointVar;
pub use point::Point;

pub mod physics;
pub mod collision;
pub mod projectile;
pub mod spawn;

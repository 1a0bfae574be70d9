pub mod callbacks;
pub mod health;
pub mod rows;
pub mod sync;

pub mod compositor;
pub mod layers;

// Toroid Blaster - a small wgpu shooter built around a fixed-capacity entity pool

pub mod engine;
pub mod game;

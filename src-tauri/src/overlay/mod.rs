pub mod bridge;
pub mod renderer;

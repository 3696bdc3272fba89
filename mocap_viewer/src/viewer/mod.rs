mod layout;
mod mesh;
mod shaders;
mod state;

pub use state::ViewerState;

pub mod atlas;
pub mod debug;
pub mod highlight;
pub mod lighting;
pub mod noise_field;
pub mod preview;
pub mod ron;
pub mod settings;
pub mod shading;
pub mod text;
pub mod water;

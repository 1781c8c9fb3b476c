pub mod scripting;
pub mod spray;
pub mod stickers;
pub mod transform;

pub mod cursor;
pub mod events;
pub mod surfaces;
pub mod timeline;

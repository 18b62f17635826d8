pub mod config;
pub mod error;
pub mod events;
pub mod hash;
pub mod motion;
pub mod session;
pub mod timeline;
pub mod processing {
    pub mod color;
    pub mod layout;
    pub mod palette;
    pub mod resize;
}
pub mod render {
    pub mod idle;
    pub mod intro;
    pub mod present;
    pub mod scene;
    pub mod slideshow;
    pub mod surface;
}
pub mod tasks {
    pub mod resolver;
    pub mod source;
    pub mod viewer;
}

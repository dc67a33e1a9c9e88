pub mod stub;
#[cfg(feature = "backend-tract")]
pub mod tract;
#[cfg(feature = "backend-tract")]
mod yolo;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

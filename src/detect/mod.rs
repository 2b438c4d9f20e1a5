mod backend;
mod backends;
mod registry;

pub use backend::{softmax, ClassifierBackend};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::{BackendRegistry, SharedBackend};

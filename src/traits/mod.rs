pub mod directory;
pub mod engine;
pub mod transport;

pub use directory::ServiceDirectory;
pub use engine::{Completion, DmaEngine, EngineReject, TransferDescriptor, TransferIdAllocator};
pub use transport::{ReplyTransport, SendOutcome};

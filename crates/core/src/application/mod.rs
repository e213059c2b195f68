// Application Layer - Engine use cases composed over the ports

pub mod coordinator;
pub mod estimator;
pub mod events;
pub mod shutdown;
pub mod token;

// Re-exports
pub use coordinator::{EnqueueRequest, QueueCoordinator};
pub use estimator::WaitEstimator;
pub use events::QueueChanged;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use token::TokenAllocator;

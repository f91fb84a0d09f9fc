pub mod queue;

pub use queue::QueueService;

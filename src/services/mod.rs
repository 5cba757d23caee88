pub mod client;
pub mod enqueuer;
pub mod poller;
pub mod presenter;
pub mod processor;
pub mod queue;
pub mod registry;

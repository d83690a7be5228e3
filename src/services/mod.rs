pub mod artifact;
pub mod assistant;
pub mod envelope;
pub mod job_api;
pub mod job_client;
pub mod poller;
pub mod storage;

mod service;

pub use service::FileSnapshotService;

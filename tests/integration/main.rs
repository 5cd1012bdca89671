mod cache;
mod lock;
mod queue;
mod shared;

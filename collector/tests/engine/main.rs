mod common;
mod provider;
mod repository;
mod scheduler;
mod wal;

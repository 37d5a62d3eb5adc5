pub mod build;
pub mod digest;
pub mod error;
pub mod lock;
pub mod node;
pub mod prereqs;
pub mod run;
pub mod session;
pub mod trace;
pub mod walk;

#[cfg(not(windows))]
use jemallocator::Jemalloc;

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
